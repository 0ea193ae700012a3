//! # libdetchar
//!
//! libdetchar is a detector characterization toolkit, written in Rust. It turns regularly
//! sampled detector data into time-frequency spectrograms, turns lists of transient
//! events into event rates, and reads and writes the channel metadata formats used to
//! describe what a detector records.
//!
//! ## Features
//!
//! `hdf5` (off by default) adds the `hdf_writer` module and lets the pipeline write
//! spectrograms and rates to HDF5 as well as CSV. It links against a system HDF5 library.
//!
//! ## Spectrograms
//!
//! A [spectrogram::Spectrogram] is a stack of averaged power spectral densities, one per
//! `stride` seconds of a [timeseries::TimeSeries]. Each PSD is built from FFTs of
//! `fftlength` seconds started every `fftstride` seconds and combined with one of the
//! [psd::AverageMethod]s. Trailing data that does not fill a whole stride is dropped.
//!
//! [specgram::from_timeseries_serial] does all of the work on the calling thread.
//! [specgram::from_timeseries] splits long series into contiguous partitions of at least
//! `min_process_size` strides, fans them out to at most `max_processes` worker threads
//! and joins the partial spectrograms back together in time order. The FFT plan and
//! window are computed once and shared read only between the workers. The result is the
//! same either way.
//!
//! ## Event rates
//!
//! An [event_table::EventTable] holds named numeric columns read from CSV, TSV or
//! whitespace separated files. Rows can be filtered with expressions like `snr > 5`, and
//! [event_table::EventTable::event_rate] bins the event times into a rate series in Hz.
//!
//! ## Channel metadata
//!
//! - [clf]: LIGO Channel List Files (INI style)
//! - [omega]: Omega scan configuration files
//! - [cis]: queries against the Channel Information System web API
//!
//! All of them produce a [channel::ChannelList].
//!
//! ## Configuration
//!
//! The processing pipeline in [process] is driven by a [config::Config], stored as YAML.
//! A template can be made with `detchar_cli new`.
pub mod channel;
pub mod cis;
pub mod clf;
pub mod config;
pub mod error;
pub mod event_table;
pub mod fft_plan;
pub mod frequency_series;
pub mod gps;
#[cfg(feature = "hdf5")]
pub mod hdf_writer;
pub mod omega;
pub mod process;
pub mod psd;
pub mod specgram;
pub mod spectrogram;
pub mod timeseries;
pub mod timeseries_reader;
pub mod units;
pub mod window;
pub mod worker_status;
pub mod writer;
