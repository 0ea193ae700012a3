use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::{ConfigError, FilterError, UnitError};
use super::event_table::Filter;
use super::specgram::{ParallelOptions, SpectrogramParams};
use super::timeseries_reader::InputFormat;
use super::units::Unit;

/// Event rate settings. Rates are computed from an event table, one series for all
/// events plus one per threshold on `threshold_column`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateConfig {
    pub events_path: PathBuf,
    pub rate_path: PathBuf,
    pub bin_width: f64,
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub timecolumn: Option<String>,
    #[serde(default)]
    pub filters: Vec<String>,
    pub threshold_column: Option<String>,
    #[serde(default)]
    pub thresholds: Vec<f64>,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            events_path: PathBuf::from("None"),
            rate_path: PathBuf::from("None"),
            bin_width: 1.0,
            start: None,
            end: None,
            timecolumn: None,
            filters: Vec::new(),
            threshold_column: None,
            thresholds: Vec::new(),
        }
    }
}

impl RateConfig {
    pub fn filters(&self) -> Result<Vec<Filter>, FilterError> {
        self.filters.iter().map(|f| f.parse()).collect()
    }
}

/// Structure representing the application configuration. Contains pathing and FFT information
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub input_path: PathBuf,
    pub input_format: InputFormat,
    pub column: Option<String>,
    pub sample_rate: f64,
    pub epoch: f64,
    pub unit: String,
    pub channel: Option<String>,
    pub output_path: PathBuf,
    pub hdf_path: Option<PathBuf>,
    pub spectrogram: SpectrogramParams,
    pub max_processes: usize,
    pub min_process_size: usize,
    pub rates: Option<RateConfig>,
}

impl Default for Config {
    /// Generate a new Config object. All paths will be empty/invalid
    fn default() -> Self {
        let parallel = ParallelOptions::default();
        Self {
            input_path: PathBuf::from("None"),
            input_format: InputFormat::default(),
            column: None,
            sample_rate: 16384.0,
            epoch: 0.0,
            unit: String::from("strain"),
            channel: None,
            output_path: PathBuf::from("None"),
            hdf_path: None,
            spectrogram: SpectrogramParams::new(1.0),
            max_processes: parallel.max_processes,
            min_process_size: parallel.min_process_size,
            rates: None,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        std::fs::write(config_path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    pub fn is_n_workers_valid(&self) -> bool {
        self.max_processes >= 1
    }

    pub fn parallel_options(&self) -> Result<ParallelOptions, ConfigError> {
        if !self.is_n_workers_valid() {
            return Err(ConfigError::BadWorkerCount(self.max_processes));
        }
        Ok(ParallelOptions {
            max_processes: self.max_processes,
            min_process_size: self.min_process_size.max(1),
        })
    }

    pub fn unit(&self) -> Result<Unit, UnitError> {
        self.unit.parse()
    }

    /// Get the directory the output files go to, which must already exist
    pub fn get_output_directory(&self) -> Result<PathBuf, ConfigError> {
        let dir = match self.output_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if dir.exists() {
            Ok(dir)
        } else {
            Err(ConfigError::BadFilePath(dir))
        }
    }

    pub fn get_rates(&self) -> Result<&RateConfig, ConfigError> {
        self.rates.as_ref().ok_or(ConfigError::MissingSection("rates"))
    }

    pub fn has_rates(&self) -> bool {
        self.rates.is_some()
    }

    pub fn need_hdf(&self) -> bool {
        self.hdf_path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psd::AverageMethod;

    #[test]
    fn test_default_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        let mut config = Config::default();
        config.rates = Some(RateConfig::default());
        config.write_config_file(&path).unwrap();
        assert_eq!(Config::read_config_file(&path).unwrap(), config);
    }

    #[test]
    fn test_read_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "\
input_path: /data/strain.bin
input_format: f32-le
column: null
sample_rate: 4096.0
epoch: 1000000000.0
unit: strain
channel: H1:GDS-CALIB_STRAIN
output_path: /data/out/specgram.csv
hdf_path: null
spectrogram:
  stride: 4.0
  fftlength: 2.0
  fftstride: 1.0
  method: median
max_processes: 4
min_process_size: 100
rates:
  events_path: /data/triggers.csv
  rate_path: /data/out/rates.csv
  bin_width: 60.0
  start: null
  end: null
  timecolumn: peak
  filters: ['snr > 5']
  threshold_column: snr
  thresholds: [8.0, 12.0]
",
        )
        .unwrap();
        let config = Config::read_config_file(&path).unwrap();
        assert_eq!(config.input_format, InputFormat::F32Le);
        assert_eq!(config.spectrogram.method, AverageMethod::Median);
        assert_eq!(config.spectrogram.fftstride(), 1.0);
        let options = config.parallel_options().unwrap();
        assert_eq!(options.max_processes, 4);
        let rates = config.get_rates().unwrap();
        assert_eq!(rates.filters().unwrap().len(), 1);
        assert_eq!(rates.thresholds, vec![8.0, 12.0]);
    }

    #[test]
    fn test_validation() {
        let config = Config {
            max_processes: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.parallel_options(),
            Err(ConfigError::BadWorkerCount(0))
        ));
        assert!(matches!(
            config.get_rates(),
            Err(ConfigError::MissingSection("rates"))
        ));
        assert!(matches!(
            Config::read_config_file(Path::new("/definitely/not/here.yml")),
            Err(ConfigError::BadFilePath(_))
        ));
    }
}
