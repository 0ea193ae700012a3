use byteorder::{ByteOrder, LittleEndian};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::error::TimeSeriesReadError;
use super::timeseries::TimeSeries;
use super::units::Unit;

/// On-disk layout of time series samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputFormat {
    /// A column of a CSV file with a header row
    #[default]
    Csv,
    /// Raw little-endian f64 samples
    F64Le,
    /// Raw little-endian f32 samples
    F32Le,
    /// Raw little-endian i16 samples (e.g. ADC counts)
    I16Le,
}

/// Read the samples of a CSV column. `column` defaults to the first one.
fn read_csv_column(path: &Path, column: Option<&str>) -> Result<Vec<f64>, TimeSeriesReadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let index = match column {
        Some(name) => reader
            .headers()?
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| TimeSeriesReadError::MissingColumn(name.to_string()))?,
        None => 0,
    };
    let mut samples = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = record
            .get(index)
            .ok_or_else(|| TimeSeriesReadError::MissingColumn(index.to_string()))?;
        samples.push(field.parse()?);
    }
    Ok(samples)
}

fn read_raw<F>(path: &Path, size: usize, convert: F) -> Result<Vec<f64>, TimeSeriesReadError>
where
    F: Fn(&[u8]) -> f64,
{
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    let remainder = bytes.len() % size;
    if remainder != 0 {
        log::warn!(
            "{} has {remainder} trailing bytes which do not form a full sample; ignoring them",
            path.display()
        );
    }
    Ok(bytes.chunks_exact(size).map(convert).collect())
}

/// Read a regularly sampled series from disk.
///
/// Raw formats carry no metadata, so the sample rate, epoch and unit always come from
/// the caller.
pub fn read_timeseries(
    path: &Path,
    format: InputFormat,
    column: Option<&str>,
    sample_rate: f64,
    epoch: f64,
    unit: Unit,
) -> Result<TimeSeries, TimeSeriesReadError> {
    if !path.exists() {
        return Err(TimeSeriesReadError::BadFilePath(path.to_path_buf()));
    }
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(TimeSeriesReadError::BadSampleRate(sample_rate));
    }
    let samples = match format {
        InputFormat::Csv => read_csv_column(path, column)?,
        InputFormat::F64Le => read_raw(path, 8, LittleEndian::read_f64)?,
        InputFormat::F32Le => read_raw(path, 4, |c| LittleEndian::read_f32(c) as f64)?,
        InputFormat::I16Le => read_raw(path, 2, |c| LittleEndian::read_i16(c) as f64)?,
    };
    log::info!(
        "Read {} samples ({}) from {}",
        samples.len(),
        human_bytes::human_bytes((samples.len() * std::mem::size_of::<f64>()) as f64),
        path.display()
    );
    Ok(TimeSeries::new(
        Array1::from(samples),
        sample_rate,
        epoch,
        unit,
    ))
}
