use fxhash::FxHashMap;
use ndarray::Array1;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use super::error::{EventTableError, FilterError};
use super::timeseries::TimeSeries;
use super::units::Unit;

/// Upper bound on the number of bins of one event rate series
const MAX_BINS: usize = 100_000_000;

/// Column names tried, in order, when no time column is given
const TIME_COLUMNS: [&str; 6] = ["time", "peak", "peak_time", "gps", "tstart", "start_time"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
        };
        write!(f, "{op}")
    }
}

/// A row filter of the form `<column> <op> <value>`, e.g. `snr > 5`
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: Comparison,
    pub value: f64,
}

impl Filter {
    pub fn new(column: &str, op: Comparison, value: f64) -> Self {
        Self {
            column: column.to_string(),
            op,
            value,
        }
    }

    pub fn matches(&self, x: f64) -> bool {
        self.op.apply(x, self.value)
    }
}

impl FromStr for Filter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op_start = s
            .find(&['<', '>', '=', '!'][..])
            .ok_or_else(|| FilterError::BadExpression(s.to_string()))?;
        let op_len = s[op_start..]
            .chars()
            .take_while(|c| matches!(c, '<' | '>' | '=' | '!'))
            .count();
        let column = s[..op_start].trim();
        let op_str = &s[op_start..op_start + op_len];
        let value = s[op_start + op_len..].trim();
        if column.is_empty() || value.is_empty() {
            return Err(FilterError::BadExpression(s.to_string()));
        }
        let op = match op_str {
            "<" => Comparison::Lt,
            "<=" => Comparison::Le,
            ">" => Comparison::Gt,
            ">=" => Comparison::Ge,
            "==" => Comparison::Eq,
            "!=" => Comparison::Ne,
            _ => return Err(FilterError::BadOperator(op_str.to_string())),
        };
        Ok(Self {
            column: column.to_string(),
            op,
            value: value.parse()?,
        })
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.column, self.op, self.value)
    }
}

/// A table of discrete events with named numeric columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    names: Vec<String>,
    columns: FxHashMap<String, Array1<f64>>,
}

impl EventTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(name, values)` pairs. All columns must have the same length.
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>) -> Result<Self, EventTableError> {
        let mut table = Self::new();
        for (name, values) in columns {
            table.add_column(&name, Array1::from(values))?;
        }
        Ok(table)
    }

    pub fn add_column(&mut self, name: &str, values: Array1<f64>) -> Result<(), EventTableError> {
        if !self.names.is_empty() && values.len() != self.len() {
            return Err(EventTableError::RaggedColumns);
        }
        if self.columns.insert(name.to_string(), values).is_none() {
            self.names.push(name.to_string());
        }
        Ok(())
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Result<&Array1<f64>, EventTableError> {
        self.columns
            .get(name)
            .ok_or_else(|| EventTableError::MissingColumn(name.to_string()))
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.names
            .first()
            .and_then(|n| self.columns.get(n))
            .map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep only the rows for which every filter matches
    pub fn filter(&self, filters: &[Filter]) -> Result<Self, EventTableError> {
        if filters.is_empty() {
            return Ok(self.clone());
        }
        let mut keep = vec![true; self.len()];
        for filter in filters {
            let column = self.column(&filter.column)?;
            for (k, x) in keep.iter_mut().zip(column.iter()) {
                *k = *k && filter.matches(*x);
            }
        }
        let mut out = Self::new();
        for name in &self.names {
            let values: Vec<f64> = self.columns[name]
                .iter()
                .zip(&keep)
                .filter(|(_, k)| **k)
                .map(|(v, _)| *v)
                .collect();
            out.add_column(name, Array1::from(values))?;
        }
        Ok(out)
    }

    /// Project onto `columns`, in the order given
    pub fn select(&self, columns: &[&str]) -> Result<Self, EventTableError> {
        let mut out = Self::new();
        for name in columns {
            out.add_column(name, self.column(name)?.clone())?;
        }
        Ok(out)
    }

    /// Read a table from a file, then apply `filters` and project onto `columns`.
    ///
    /// `.csv` files are comma separated and `.tsv` tab separated, both with a header
    /// row. Anything else is read as whitespace separated ASCII whose header may be a
    /// `#` comment line. Filters may refer to columns that are not projected.
    pub fn read(
        path: &Path,
        columns: Option<&[&str]>,
        filters: &[Filter],
    ) -> Result<Self, EventTableError> {
        if !path.exists() {
            return Err(EventTableError::BadFilePath(path.to_path_buf()));
        }
        let table = match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => Self::read_delimited(path, b',')?,
            Some("tsv") => Self::read_delimited(path, b'\t')?,
            _ => Self::read_ascii(path)?,
        };
        log::debug!(
            "Read {} events with columns {:?} from {}",
            table.len(),
            table.column_names(),
            path.display()
        );
        let filtered = table.filter(filters)?;
        match columns {
            Some(cols) => filtered.select(cols),
            None => Ok(filtered),
        }
    }

    fn from_rows(names: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, EventTableError> {
        let mut values: Vec<Vec<f64>> = vec![Vec::with_capacity(rows.len()); names.len()];
        for row in rows {
            if row.len() != names.len() {
                return Err(EventTableError::RaggedColumns);
            }
            for ((column, field), name) in values.iter_mut().zip(row).zip(&names) {
                column.push(
                    field
                        .trim()
                        .parse()
                        .map_err(|e| EventTableError::ParsingError(name.clone(), e))?,
                );
            }
        }
        Self::from_columns(names.into_iter().zip(values).collect())
    }

    fn read_delimited(path: &Path, delimiter: u8) -> Result<Self, EventTableError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_path(path)?;
        let names: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(String::from).collect());
        }
        Self::from_rows(names, rows)
    }

    fn read_ascii(path: &Path) -> Result<Self, EventTableError> {
        let reader = BufReader::new(File::open(path)?);
        let mut names: Option<Vec<String>> = None;
        let mut rows = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(header) = trimmed.strip_prefix('#') {
                if names.is_none() && !header.trim().is_empty() {
                    names = Some(header.split_whitespace().map(String::from).collect());
                }
                continue;
            }
            if names.is_none() {
                names = Some(trimmed.split_whitespace().map(String::from).collect());
                continue;
            }
            rows.push(trimmed.split_whitespace().map(String::from).collect());
        }
        Self::from_rows(names.unwrap_or_default(), rows)
    }

    fn resolve_time_column<'a>(&self, timecolumn: Option<&'a str>) -> Result<&'a str, EventTableError> {
        match timecolumn {
            Some(name) => {
                self.column(name)?;
                Ok(name)
            }
            None => TIME_COLUMNS
                .iter()
                .find(|name| self.columns.contains_key(**name))
                .copied()
                .ok_or(EventTableError::NoTimeColumn),
        }
    }

    /// Resolve default bounds: `start` is the earliest event, `end` the end of the bin
    /// holding the latest one.
    fn resolve_bounds(
        times: &Array1<f64>,
        bin_width: f64,
        start: Option<f64>,
        end: Option<f64>,
    ) -> (f64, f64) {
        let start = start.unwrap_or_else(|| times.iter().copied().fold(f64::INFINITY, f64::min));
        let end = end.unwrap_or_else(|| {
            let latest = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            start + (((latest - start) / bin_width).floor() + 1.0) * bin_width
        });
        (start, end)
    }

    /// Rate of events (Hz) in bins of `bin_width` seconds over `[start, end)`.
    ///
    /// The last bin is truncated at `end`; its rate is still normalized by the full bin
    /// width. Missing bounds default to the span of the events.
    pub fn event_rate(
        &self,
        bin_width: f64,
        start: Option<f64>,
        end: Option<f64>,
        timecolumn: Option<&str>,
    ) -> Result<TimeSeries, EventTableError> {
        if !(bin_width.is_finite() && bin_width > 0.0) {
            return Err(EventTableError::BadBinWidth(bin_width));
        }
        let name = self.resolve_time_column(timecolumn)?;
        let times = self.column(name)?;
        if times.is_empty() && (start.is_none() || end.is_none()) {
            return Err(EventTableError::BadTimeRange(
                start.unwrap_or(f64::NAN),
                end.unwrap_or(f64::NAN),
            ));
        }
        let (start, end) = Self::resolve_bounds(times, bin_width, start, end);
        if !(end > start) {
            return Err(EventTableError::BadTimeRange(start, end));
        }

        // Guard against (end - start) / width landing a hair above an integer
        let n_bins = ((end - start) / bin_width - 1e-9).ceil().max(1.0);
        if !(n_bins <= MAX_BINS as f64) {
            return Err(EventTableError::TooManyBins(start, end, bin_width));
        }
        let n_bins = n_bins as usize;
        let mut counts = Array1::<f64>::zeros(n_bins);
        for t in times.iter().filter(|t| **t >= start && **t < end) {
            let bin = (((t - start) / bin_width).floor() as usize).min(n_bins - 1);
            counts[bin] += 1.0;
        }
        counts.mapv_inplace(|c| c / bin_width);
        Ok(TimeSeries::new(counts, 1.0 / bin_width, start, Unit::hertz()))
    }

    /// Event rates for each threshold in `thresholds`, counting only events whose
    /// `column` is at least that threshold. All series share the same bins.
    pub fn binned_event_rates(
        &self,
        bin_width: f64,
        column: &str,
        thresholds: &[f64],
        start: Option<f64>,
        end: Option<f64>,
        timecolumn: Option<&str>,
    ) -> Result<Vec<(f64, TimeSeries)>, EventTableError> {
        let name = self.resolve_time_column(timecolumn)?;
        let (start, end) = if self.is_empty() {
            (
                start.ok_or(EventTableError::BadTimeRange(f64::NAN, f64::NAN))?,
                end.ok_or(EventTableError::BadTimeRange(f64::NAN, f64::NAN))?,
            )
        } else {
            Self::resolve_bounds(self.column(name)?, bin_width, start, end)
        };
        thresholds
            .iter()
            .map(|threshold| {
                let subset = self.filter(&[Filter::new(column, Comparison::Ge, *threshold)])?;
                let rate = subset.event_rate(bin_width, Some(start), Some(end), Some(name))?;
                Ok((*threshold, rate))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_table() -> EventTable {
        EventTable::from_columns(vec![
            (String::from("time"), vec![0.5, 1.2, 1.9, 3.4]),
            (String::from("snr"), vec![5.0, 12.0, 8.0, 20.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_event_rate_example() {
        let rate = sample_table()
            .event_rate(1.0, Some(0.0), Some(4.0), None)
            .unwrap();
        // 3.4 falls in [3, 4)
        assert_eq!(rate.data().to_vec(), vec![1.0, 2.0, 0.0, 1.0]);
        assert_eq!(rate.epoch(), 0.0);
        assert_eq!(rate.sample_rate(), 1.0);
        assert_eq!(rate.unit(), &Unit::hertz());
    }

    #[test]
    fn test_event_rate_truncates_trailing_bin() {
        let rate = sample_table()
            .event_rate(2.0, Some(0.0), Some(3.0), None)
            .unwrap();
        // bins [0, 2) and [2, 3); the event at 3.4 is past the end
        assert_eq!(rate.data().to_vec(), vec![1.5, 0.0]);
    }

    #[test]
    fn test_event_rate_default_bounds() {
        let rate = sample_table().event_rate(1.0, None, None, None).unwrap();
        assert_eq!(rate.epoch(), 0.5);
        assert_eq!(rate.data().sum(), 4.0);
    }

    #[test]
    fn test_binned_rates() {
        let rates = sample_table()
            .binned_event_rates(1.0, "snr", &[0.0, 10.0], Some(0.0), Some(4.0), Some("time"))
            .unwrap();
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].1.data().to_vec(), vec![1.0, 2.0, 0.0, 1.0]);
        assert_eq!(rates[1].0, 10.0);
        assert_eq!(rates[1].1.data().to_vec(), vec![0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_event_rate_rejects_huge_range() {
        let table = sample_table();
        assert!(matches!(
            table.event_rate(1.0, Some(0.0), Some(1e18), None),
            Err(EventTableError::TooManyBins(_, _, _))
        ));
        assert!(matches!(
            table.event_rate(1.0, Some(0.0), Some(f64::INFINITY), None),
            Err(EventTableError::TooManyBins(_, _, _))
        ));
    }

    #[test]
    fn test_event_rate_errors() {
        let table = sample_table();
        assert!(matches!(
            table.event_rate(0.0, Some(0.0), Some(4.0), None),
            Err(EventTableError::BadBinWidth(_))
        ));
        assert!(matches!(
            table.event_rate(1.0, Some(4.0), Some(4.0), None),
            Err(EventTableError::BadTimeRange(_, _))
        ));
        assert!(matches!(
            table.event_rate(1.0, None, None, Some("peak")),
            Err(EventTableError::MissingColumn(_))
        ));
        let no_time = table.select(&["snr"]).unwrap();
        assert!(matches!(
            no_time.event_rate(1.0, None, None, None),
            Err(EventTableError::NoTimeColumn)
        ));
    }

    #[test]
    fn test_filter_parse() {
        let filter: Filter = "snr >= 8".parse().unwrap();
        assert_eq!(filter, Filter::new("snr", Comparison::Ge, 8.0));
        let filter: Filter = "peak<100.5".parse().unwrap();
        assert_eq!(filter.op, Comparison::Lt);
        assert_eq!(filter.to_string(), "peak < 100.5");
        assert!(matches!(
            "snr = 8".parse::<Filter>(),
            Err(FilterError::BadOperator(_))
        ));
        assert!(matches!(
            "snr".parse::<Filter>(),
            Err(FilterError::BadExpression(_))
        ));
        assert!(matches!(
            "snr > big".parse::<Filter>(),
            Err(FilterError::BadValue(_))
        ));
    }

    #[test]
    fn test_filter_rows() {
        let filtered = sample_table()
            .filter(&["snr > 6".parse().unwrap(), "time < 3".parse().unwrap()])
            .unwrap();
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.column("time").unwrap().to_vec(), vec![1.2, 1.9]);
    }

    #[test]
    fn test_read_csv_with_projection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "peak, snr, frequency").unwrap();
        writeln!(file, "100.5, 5.5, 30").unwrap();
        writeln!(file, "101.25, 9.0, 45").unwrap();
        writeln!(file, "102.0, 7.5, 60").unwrap();
        drop(file);

        let filters = vec!["frequency > 40".parse().unwrap()];
        let table = EventTable::read(&path, Some(&["snr", "peak"]), &filters).unwrap();
        assert_eq!(table.column_names(), &["snr", "peak"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.column("peak").unwrap().to_vec(), vec![101.25, 102.0]);
        assert!(table.column("frequency").is_err());
    }

    #[test]
    fn test_read_ascii() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triggers.txt");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "# time snr").unwrap();
        writeln!(file, "0.5   5").unwrap();
        writeln!(file, "1.2\t12").unwrap();
        drop(file);

        let table = EventTable::read(&path, None, &[]).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.column("snr").unwrap().to_vec(), vec![5.0, 12.0]);
    }

    #[test]
    fn test_read_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            EventTable::read(&dir.path().join("missing.csv"), None, &[]),
            Err(EventTableError::BadFilePath(_))
        ));
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "time,snr\n1.0,abc\n").unwrap();
        assert!(matches!(
            EventTable::read(&path, None, &[]),
            Err(EventTableError::ParsingError(_, _))
        ));
    }
}
