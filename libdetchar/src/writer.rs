use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::error::WriterError;
use super::gps::format_gps;
use super::specgram::SpectrogramParams;
use super::spectrogram::Spectrogram;
use super::timeseries::TimeSeries;

/// Version of the CSV + YAML output layout
const FORMAT_VERSION: &str = "1.0";

/// Everything needed to interpret a written spectrogram, stored next to the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrogramMetadata {
    pub version: String,
    pub channel: Option<String>,
    pub epoch: f64,
    pub utc: Option<String>,
    pub dt: f64,
    pub f0: f64,
    pub df: f64,
    pub unit: String,
    pub n_steps: usize,
    pub n_frequencies: usize,
    pub size: String,
    pub fftlength: f64,
    pub fftstride: f64,
    pub method: String,
    pub window: String,
}

impl SpectrogramMetadata {
    pub fn new(spectrogram: &Spectrogram, params: &SpectrogramParams) -> Self {
        let utc = match format_gps(spectrogram.epoch()) {
            Ok(utc) => Some(utc),
            Err(e) => {
                log::warn!("Could not convert epoch {} to UTC: {e}", spectrogram.epoch());
                None
            }
        };
        Self {
            version: format!("{}:{}", env!("CARGO_PKG_NAME"), FORMAT_VERSION),
            channel: spectrogram.channel().map(String::from),
            epoch: spectrogram.epoch(),
            utc,
            dt: spectrogram.dt(),
            f0: spectrogram.f0(),
            df: spectrogram.df(),
            unit: spectrogram.unit().to_string(),
            n_steps: spectrogram.n_steps(),
            n_frequencies: spectrogram.n_frequencies(),
            size: human_bytes::human_bytes(spectrogram.nbytes() as f64),
            fftlength: params.fftlength(),
            fftstride: params.fftstride(),
            method: params.method.to_string(),
            window: params.window.to_string(),
        }
    }
}

/// The YAML file that sits next to a data file: `data.csv` -> `data.yml`
pub fn sidecar_path(path: &Path) -> PathBuf {
    path.with_extension("yml")
}

pub fn write_metadata<T: Serialize>(metadata: &T, path: &Path) -> Result<(), WriterError> {
    let mut file = File::create(path)?;
    file.write_all(serde_yaml::to_string(metadata)?.as_bytes())?;
    Ok(())
}

pub fn read_metadata(path: &Path) -> Result<SpectrogramMetadata, WriterError> {
    let yaml_str = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&yaml_str)?)
}

/// Write a spectrogram as CSV, one row per time step: `time,<f0>,<f0 + df>,...`.
/// The metadata goes to the sidecar YAML file.
pub fn write_spectrogram_csv(
    spectrogram: &Spectrogram,
    params: &SpectrogramParams,
    path: &Path,
) -> Result<(), WriterError> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec![String::from("time")];
    header.extend(spectrogram.frequencies().iter().map(|f| f.to_string()));
    writer.write_record(&header)?;
    for (time, row) in spectrogram.times().iter().zip(spectrogram.data().rows()) {
        let mut record = vec![time.to_string()];
        record.extend(row.iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;

    let metadata = SpectrogramMetadata::new(spectrogram, params);
    write_metadata(&metadata, &sidecar_path(path))?;
    log::info!(
        "Wrote {} spectrogram of shape {:?} to {}",
        metadata.size,
        spectrogram.shape(),
        path.display()
    );
    Ok(())
}

/// Write one or more series sharing a time axis as CSV columns `time,<name>...`.
/// Series are truncated to the shortest one.
pub fn write_series_csv(
    columns: &[(String, &TimeSeries)],
    path: &Path,
) -> Result<(), WriterError> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec![String::from("time")];
    header.extend(columns.iter().map(|(name, _)| name.clone()));
    writer.write_record(&header)?;
    if let Some((_, first)) = columns.first() {
        let n_rows = columns.iter().map(|(_, s)| s.len()).min().unwrap_or(0);
        let times = first.times();
        for row in 0..n_rows {
            let mut record = vec![times[row].to_string()];
            record.extend(columns.iter().map(|(_, s)| s.data()[row].to_string()));
            writer.write_record(&record)?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Unit;
    use ndarray::{array, Array2};

    #[test]
    fn test_write_spectrogram() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("specgram.csv");
        let spectrogram = Spectrogram::new(
            Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap(),
            1_000_000_000.0,
            2.0,
            0.0,
            0.5,
            Unit::per_hertz(),
        )
        .with_channel(Some("X1:TEST"));
        let params = SpectrogramParams::new(2.0).with_fftlength(1.0);
        write_spectrogram_csv(&spectrogram, &params, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "time,0,0.5,1");
        assert_eq!(lines[1], "1000000000,1,2,3");
        assert_eq!(lines[2], "1000000002,4,5,6");

        let metadata = read_metadata(&sidecar_path(&path)).unwrap();
        assert_eq!(metadata, SpectrogramMetadata::new(&spectrogram, &params));
        assert_eq!(metadata.channel.as_deref(), Some("X1:TEST"));
        assert_eq!(metadata.utc.as_deref(), Some("2011-09-14T01:46:25Z"));
        assert_eq!(metadata.unit, "1 / Hz");
        assert_eq!(metadata.fftstride, 1.0);
        assert_eq!((metadata.n_steps, metadata.n_frequencies), (2, 3));
    }

    #[test]
    fn test_write_series() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rates.csv");
        let a = TimeSeries::new(array![1.0, 2.0, 0.0], 0.5, 10.0, Unit::hertz());
        let b = TimeSeries::new(array![0.5, 0.0], 0.5, 10.0, Unit::hertz());
        write_series_csv(
            &[(String::from("all"), &a), (String::from("loud"), &b)],
            &path,
        )
        .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "time,all,loud\n10,1,0.5\n12,2,0\n");
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/data/run_0001.csv")),
            PathBuf::from("/data/run_0001.yml")
        );
    }
}
