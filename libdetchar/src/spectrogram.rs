use ndarray::{concatenate, Array1, Array2, ArrayView1, Axis};

use super::error::SpectrogramError;
use super::units::Unit;

/// Relative tolerance used when comparing time and frequency axes of partial
/// spectrograms.
const AXIS_TOLERANCE: f64 = 1e-9;

fn close(a: f64, b: f64, scale: f64) -> bool {
    (a - b).abs() <= AXIS_TOLERANCE * scale.abs().max(1.0)
}

/// GPS epochs are large, so allow a few ulps of the epoch itself on top of a fraction
/// of the step.
fn epochs_close(a: f64, b: f64, dt: f64) -> bool {
    (a - b).abs() <= 1e-6 * dt.abs() + 16.0 * f64::EPSILON * a.abs().max(b.abs())
}

/// A time-frequency array. Row `i` is the spectrum starting at `epoch + i * dt`, column
/// `j` is frequency `f0 + j * df`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    data: Array2<f64>,
    epoch: f64,
    dt: f64,
    f0: f64,
    df: f64,
    unit: Unit,
    channel: Option<String>,
}

impl Spectrogram {
    pub fn new(data: Array2<f64>, epoch: f64, dt: f64, f0: f64, df: f64, unit: Unit) -> Self {
        Self {
            data,
            epoch,
            dt,
            f0,
            df,
            unit,
            channel: None,
        }
    }

    /// Zero-filled spectrogram of the given shape
    pub fn zeros(shape: (usize, usize), epoch: f64, dt: f64, f0: f64, df: f64, unit: Unit) -> Self {
        Self::new(Array2::zeros(shape), epoch, dt, f0, df, unit)
    }

    pub fn with_channel(mut self, channel: Option<&str>) -> Self {
        self.channel = channel.map(String::from);
        self
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn into_data(self) -> Array2<f64> {
        self.data
    }

    pub fn epoch(&self) -> f64 {
        self.epoch
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn f0(&self) -> f64 {
        self.f0
    }

    pub fn df(&self) -> f64 {
        self.df
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn set_unit(&mut self, unit: Unit) {
        self.unit = unit;
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// (number of time steps, number of frequency bins)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn n_steps(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_frequencies(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.n_steps() == 0
    }

    pub fn row(&self, step: usize) -> ArrayView1<f64> {
        self.data.row(step)
    }

    /// Overwrite the spectrum of one time step
    pub fn set_row(&mut self, step: usize, spectrum: &Array1<f64>) {
        self.data.row_mut(step).assign(spectrum);
    }

    pub fn times(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.n_steps(), |i| self.epoch + i as f64 * self.dt)
    }

    pub fn frequencies(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.n_frequencies(), |j| self.f0 + j as f64 * self.df)
    }

    /// Semi-open GPS interval covered by the rows of this spectrogram
    pub fn span(&self) -> (f64, f64) {
        (self.epoch, self.epoch + self.n_steps() as f64 * self.dt)
    }

    /// Size of the data array in bytes
    pub fn nbytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f64>()
    }
}

/// An ordered collection of spectrograms over contiguous spans of the same series.
#[derive(Debug, Clone, Default)]
pub struct SpectrogramList {
    items: Vec<Spectrogram>,
}

impl SpectrogramList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, spectrogram: Spectrogram) {
        self.items.push(spectrogram);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Spectrogram> {
        self.items.iter()
    }

    pub fn sort_by_epoch(&mut self) {
        self.items.sort_by(|a, b| a.epoch.total_cmp(&b.epoch));
    }

    /// Concatenate the rows of every spectrogram, in list order, into one.
    ///
    /// Zero-row entries are skipped unless all entries are empty, in which case the
    /// first is returned. Entries must share `dt`, `f0`, `df` and bin count, and each
    /// must start where the previous one ends.
    pub fn join(self) -> Result<Spectrogram, SpectrogramError> {
        let mut items = self.items.into_iter();
        let first = items.next().ok_or(SpectrogramError::NothingToJoin)?;
        let rest: Vec<Spectrogram> = items.filter(|s| !s.is_empty()).collect();
        let mut parts: Vec<Spectrogram> = Vec::with_capacity(rest.len() + 1);
        if !first.is_empty() || rest.is_empty() {
            parts.push(first);
        }
        parts.extend(rest);

        let reference = &parts[0];
        for pair in parts.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if !close(next.dt, reference.dt, reference.dt) {
                return Err(SpectrogramError::Mismatched("dt"));
            }
            if !close(next.df, reference.df, reference.df) {
                return Err(SpectrogramError::Mismatched("df"));
            }
            if !close(next.f0, reference.f0, reference.df) {
                return Err(SpectrogramError::Mismatched("f0"));
            }
            if next.n_frequencies() != reference.n_frequencies() {
                return Err(SpectrogramError::Mismatched("frequency bins"));
            }
            let end = prev.span().1;
            if !epochs_close(next.epoch, end, reference.dt) {
                return Err(SpectrogramError::NotContiguous(end, next.epoch));
            }
        }

        let views: Vec<_> = parts.iter().map(|s| s.data.view()).collect();
        let data = concatenate(Axis(0), &views)
            .map_err(|_| SpectrogramError::Mismatched("frequency bins"))?;
        let first = &parts[0];
        Ok(Spectrogram {
            data,
            epoch: first.epoch,
            dt: first.dt,
            f0: first.f0,
            df: first.df,
            unit: first.unit.clone(),
            channel: first.channel.clone(),
        })
    }
}

impl FromIterator<Spectrogram> for SpectrogramList {
    fn from_iter<T: IntoIterator<Item = Spectrogram>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for SpectrogramList {
    type Item = Spectrogram;
    type IntoIter = std::vec::IntoIter<Spectrogram>;
    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(rows: usize, epoch: f64, value: f64) -> Spectrogram {
        Spectrogram::new(
            Array2::from_elem((rows, 3), value),
            epoch,
            2.0,
            0.0,
            1.0,
            Unit::per_hertz(),
        )
    }

    #[test]
    fn test_axes() {
        let spec = filled(4, 100.0, 1.0);
        assert_eq!(spec.shape(), (4, 3));
        assert_eq!(spec.span(), (100.0, 108.0));
        assert_eq!(spec.times().to_vec(), vec![100.0, 102.0, 104.0, 106.0]);
        assert_eq!(spec.frequencies().to_vec(), vec![0.0, 1.0, 2.0]);
        assert_eq!(spec.nbytes(), 96);
    }

    #[test]
    fn test_sort_and_join() {
        let mut list: SpectrogramList =
            vec![filled(2, 104.0, 2.0), filled(2, 100.0, 1.0), filled(0, 108.0, 0.0)]
                .into_iter()
                .collect();
        list.sort_by_epoch();
        let joined = list.join().unwrap();
        assert_eq!(joined.shape(), (4, 3));
        assert_eq!(joined.epoch(), 100.0);
        assert_eq!(joined.row(0)[0], 1.0);
        assert_eq!(joined.row(3)[0], 2.0);
    }

    #[test]
    fn test_join_rejects_gap() {
        let list: SpectrogramList = vec![filled(2, 100.0, 1.0), filled(2, 106.0, 1.0)]
            .into_iter()
            .collect();
        assert!(matches!(
            list.join(),
            Err(SpectrogramError::NotContiguous(_, _))
        ));
    }

    #[test]
    fn test_join_rejects_mismatched_frequencies() {
        let other = Spectrogram::new(Array2::zeros((2, 5)), 104.0, 2.0, 0.0, 1.0, Unit::per_hertz());
        let list: SpectrogramList = vec![filled(2, 100.0, 1.0), other].into_iter().collect();
        assert!(matches!(
            list.join(),
            Err(SpectrogramError::Mismatched("frequency bins"))
        ));
    }

    #[test]
    fn test_join_all_empty() {
        let list: SpectrogramList = vec![filled(0, 100.0, 0.0)].into_iter().collect();
        assert_eq!(list.join().unwrap().shape(), (0, 3));
        assert!(matches!(
            SpectrogramList::new().join(),
            Err(SpectrogramError::NothingToJoin)
        ));
    }
}
