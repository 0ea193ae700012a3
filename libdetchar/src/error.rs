use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    #[error("Unit string is empty")]
    Empty,
    #[error("Malformed unit exponent in term {0}")]
    BadExponent(String),
    #[error("Unit division is undefined for unrecognized unit {0}")]
    Undefined(String),
}

#[derive(Debug, Error)]
pub enum PsdError {
    #[error("PSD requested with invalid FFT length of {0} samples")]
    BadFftLength(usize),
    #[error("PSD requested with invalid FFT stride of {0} samples")]
    BadFftStride(usize),
    #[error("Series of {0} samples is too short for an FFT of {1} samples")]
    SeriesTooShort(usize, usize),
    #[error("Window of length {0} does not match FFT length {1}")]
    WindowLength(usize, usize),
    #[error("FFT plan of length {0} does not match FFT length {1}")]
    PlanLength(usize, usize),
    #[error("Unrecognized PSD averaging method: {0}")]
    UnknownMethod(String),
    #[error("Unrecognized window function: {0}")]
    UnknownWindow(String),
    #[error("FFT failed: {0}")]
    FftFailed(#[from] realfft::FftError),
}

#[derive(Debug, Error)]
pub enum SpectrogramError {
    #[error("Spectrogram parameter {0} must be positive and finite, got {1}")]
    BadParameter(&'static str, f64),
    #[error("Spectrogram parameter {0} of {1} s is shorter than one sample")]
    BelowOneSample(&'static str, f64),
    #[error("FFT length {0} s exceeds spectrogram stride {1} s")]
    FftLongerThanStride(f64, f64),
    #[error("Spectrogram failed due to PSD error: {0}")]
    PsdError(#[from] PsdError),
    #[error("Cannot join spectrograms with mismatched {0}")]
    Mismatched(&'static str),
    #[error("Cannot join spectrograms: span ending at {0} is not contiguous with span starting at {1}")]
    NotContiguous(f64, f64),
    #[error("Cannot join an empty list of spectrograms")]
    NothingToJoin,
    #[error("Failed to spawn spectrogram worker: {0}")]
    SpawnFailed(#[from] std::io::Error),
    #[error("Spectrogram worker {0} panicked")]
    WorkerPanicked(usize),
    #[error("Spectrogram worker results are missing for partition {0}")]
    MissingPartition(usize),
    #[error("Spectrogram worker failed to send progress: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Filter expression '{0}' is not of the form '<column> <op> <value>'")]
    BadExpression(String),
    #[error("Filter operator '{0}' is not supported")]
    BadOperator(String),
    #[error("Filter value failed to parse: {0}")]
    BadValue(#[from] std::num::ParseFloatError),
}

#[derive(Debug, Error)]
pub enum EventTableError {
    #[error("Could not read EventTable because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("EventTable failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("EventTable failed to parse CSV: {0}")]
    CsvError(#[from] csv::Error),
    #[error("EventTable failed to parse a number in column {0}: {1}")]
    ParsingError(String, std::num::ParseFloatError),
    #[error("EventTable has no column named {0}")]
    MissingColumn(String),
    #[error("EventTable columns have mismatched lengths")]
    RaggedColumns,
    #[error("EventTable has no recognizable time column")]
    NoTimeColumn,
    #[error("Event rate requested with invalid bin width {0}")]
    BadBinWidth(f64),
    #[error("Event rate requested with end {1} not after start {0}")]
    BadTimeRange(f64, f64),
    #[error("Event rate from {0} to {1} with bin width {2} needs too many bins")]
    TooManyBins(f64, f64, f64),
    #[error("EventTable failed due to filter error: {0}")]
    FilterError(#[from] FilterError),
}

#[derive(Debug, Error)]
pub enum ChannelListError {
    #[error("Channel list failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Channel list line {0} is outside of any section")]
    NoSection(usize),
    #[error("Channel list line {0} is malformed: {1}")]
    BadLine(usize, String),
}

#[derive(Debug, Error)]
pub enum ScanConfigError {
    #[error("Scan config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Scan config line {0} is malformed: {1}")]
    BadLine(usize, String),
    #[error("Scan config block opened on line {0} was never closed")]
    UnclosedBlock(usize),
    #[error("Scan config block on line {0} has no channelName")]
    NoChannelName(usize),
}

#[derive(Debug, Error)]
pub enum CisError {
    #[error("CIS request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("CIS response failed to parse: {0}")]
    ParsingError(#[from] serde_json::Error),
    #[error("CIS returned no channel named {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum GpsError {
    #[error("GPS time {0} is not finite")]
    NotFinite(f64),
    #[error("GPS time is out of range: {0}")]
    OutOfRange(#[from] time::error::ComponentRange),
    #[error("Failed to format UTC time: {0}")]
    Format(#[from] time::error::Format),
}

#[derive(Debug, Error)]
pub enum TimeSeriesReadError {
    #[error("Could not read TimeSeries because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("TimeSeries read failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("TimeSeries read failed to parse CSV: {0}")]
    CsvError(#[from] csv::Error),
    #[error("TimeSeries file has no column named {0}")]
    MissingColumn(String),
    #[error("TimeSeries read failed to parse a sample: {0}")]
    ParsingError(#[from] std::num::ParseFloatError),
    #[error("TimeSeries requested with invalid sample rate {0}")]
    BadSampleRate(f64),
}

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("Writer failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Writer failed to write CSV: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Writer failed to convert to yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[cfg(feature = "hdf5")]
    #[error("Writer failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has invalid number of workers {0}; must be at least 1")]
    BadWorkerCount(usize),
    #[error("Config has no {0} section")]
    MissingSection(&'static str),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to TimeSeries read error: {0}")]
    ReadError(#[from] TimeSeriesReadError),
    #[error("Processor failed due to Spectrogram error: {0}")]
    SpectrogramError(#[from] SpectrogramError),
    #[error("Processor failed due to EventTable error: {0}")]
    EventTableError(#[from] EventTableError),
    #[error("Processor failed due to Writer error: {0}")]
    WriterError(#[from] WriterError),
    #[error("Processor failed due to Unit error: {0}")]
    UnitError(#[from] UnitError),
}
