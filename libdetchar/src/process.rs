use std::sync::mpsc::Sender;

use super::config::Config;
use super::error::{EventTableError, ProcessorError};
use super::event_table::EventTable;
use super::specgram::from_timeseries_with_progress;
use super::spectrogram::Spectrogram;
use super::timeseries::TimeSeries;
use super::timeseries_reader::read_timeseries;
use super::worker_status::WorkerStatus;
use super::writer::{write_series_csv, write_spectrogram_csv};

#[cfg(feature = "hdf5")]
use super::hdf_writer::HDFWriter;

/// Read the configured time series and compute its spectrogram, writing CSV (and HDF5 when
/// requested) output.
///
/// Progress of every partition is forwarded on `tx` if given.
pub fn process_spectrogram(
    config: &Config,
    tx: Option<Sender<WorkerStatus>>,
) -> Result<Spectrogram, ProcessorError> {
    let mut series = read_timeseries(
        &config.input_path,
        config.input_format,
        config.column.as_deref(),
        config.sample_rate,
        config.epoch,
        config.unit()?,
    )?;
    if let Some(channel) = &config.channel {
        series = series.with_channel(channel);
    }
    let options = config.parallel_options()?;
    config.get_output_directory()?;

    log::info!(
        "Building spectrogram of {} s of data with stride {} s, FFT length {} s ({})",
        series.duration(),
        config.spectrogram.stride,
        config.spectrogram.fftlength(),
        config.spectrogram.method
    );
    let spectrogram = from_timeseries_with_progress(&series, &config.spectrogram, &options, tx)?;
    write_spectrogram_csv(&spectrogram, &config.spectrogram, &config.output_path)?;

    if let Some(hdf_path) = &config.hdf_path {
        write_hdf_spectrogram(config, &spectrogram, hdf_path)?;
    }
    Ok(spectrogram)
}

#[cfg(feature = "hdf5")]
fn write_hdf_spectrogram(
    config: &Config,
    spectrogram: &Spectrogram,
    hdf_path: &std::path::Path,
) -> Result<(), ProcessorError> {
    let writer = HDFWriter::new(hdf_path)?;
    writer.write_spectrogram(spectrogram, &config.spectrogram)?;
    writer.close()?;
    Ok(())
}

#[cfg(not(feature = "hdf5"))]
fn write_hdf_spectrogram(
    _config: &Config,
    _spectrogram: &Spectrogram,
    hdf_path: &std::path::Path,
) -> Result<(), ProcessorError> {
    log::warn!(
        "HDF5 output to {} requested, but libdetchar was built without the hdf5 feature. Skipping.",
        hdf_path.display()
    );
    Ok(())
}

/// Compute the event rates described by the rates section of the config and write them
/// as CSV columns: `all` followed by `<column> >= <threshold>` for each threshold.
pub fn process_event_rates(config: &Config) -> Result<Vec<(String, TimeSeries)>, ProcessorError> {
    let rates_config = config.get_rates()?;
    let filters = rates_config.filters().map_err(EventTableError::from)?;
    let table = EventTable::read(&rates_config.events_path, None, &filters)?;
    log::info!(
        "Loaded {} events from {}",
        table.len(),
        rates_config.events_path.display()
    );

    let timecolumn = rates_config.timecolumn.as_deref();
    let all = table.event_rate(
        rates_config.bin_width,
        rates_config.start,
        rates_config.end,
        timecolumn,
    )?;
    let mut rates = vec![(String::from("all"), all)];
    if let Some(column) = &rates_config.threshold_column {
        // Share the bins of the unthresholded rate
        let (start, end) = rates[0].1.span();
        let binned = table.binned_event_rates(
            rates_config.bin_width,
            column,
            &rates_config.thresholds,
            Some(start),
            Some(end),
            timecolumn,
        )?;
        rates.extend(
            binned
                .into_iter()
                .map(|(threshold, rate)| (format!("{column} >= {threshold}"), rate)),
        );
    } else if !rates_config.thresholds.is_empty() {
        log::warn!("Rate thresholds given without a threshold_column; ignoring them");
    }

    let columns: Vec<(String, &TimeSeries)> =
        rates.iter().map(|(name, rate)| (name.clone(), rate)).collect();
    write_series_csv(&columns, &rates_config.rate_path)?;
    log::info!(
        "Wrote {} rate series of {} bins to {}",
        rates.len(),
        rates[0].1.len(),
        rates_config.rate_path.display()
    );

    if let Some(hdf_path) = &config.hdf_path {
        write_hdf_rates(&columns, &hdf_path.with_extension("rates.h5"))?;
    }
    Ok(rates)
}

#[cfg(feature = "hdf5")]
fn write_hdf_rates(
    columns: &[(String, &TimeSeries)],
    hdf_path: &std::path::Path,
) -> Result<(), ProcessorError> {
    let writer = HDFWriter::new(hdf_path)?;
    writer.write_rates(columns)?;
    writer.close()?;
    Ok(())
}

#[cfg(not(feature = "hdf5"))]
fn write_hdf_rates(
    _columns: &[(String, &TimeSeries)],
    hdf_path: &std::path::Path,
) -> Result<(), ProcessorError> {
    log::warn!(
        "HDF5 output to {} requested, but libdetchar was built without the hdf5 feature. Skipping.",
        hdf_path.display()
    );
    Ok(())
}

/// The main entry point: spectrogram, then event rates if the config has a rates section.
pub fn process(
    config: &Config,
    tx: Option<Sender<WorkerStatus>>,
) -> Result<Spectrogram, ProcessorError> {
    let spectrogram = process_spectrogram(config, tx)?;
    log::info!(
        "Spectrogram finished: {} strides x {} frequencies",
        spectrogram.n_steps(),
        spectrogram.n_frequencies()
    );
    if config.has_rates() {
        process_event_rates(config)?;
    }
    Ok(spectrogram)
}
