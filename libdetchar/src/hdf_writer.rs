use hdf5::types::VarLenUnicode;
use hdf5::File;
use std::path::Path;
use std::str::FromStr;

use super::error::WriterError;
use super::specgram::SpectrogramParams;
use super::spectrogram::Spectrogram;
use super::timeseries::TimeSeries;
use super::writer::SpectrogramMetadata;

const SPECTROGRAM_NAME: &str = "spectrogram";
const RATES_NAME: &str = "rates";

/// A simple struct which wraps around the hdf5-rust library.
///
/// Opens an HDF5 file for writing spectrograms and event rates.
// Structure
// spectrogram(dset) - epoch, dt, f0, df, unit, channel, utc, method, window, fftlength, fftstride, version
// rates
// |---- <name>(dset) - epoch, dt, unit
#[derive(Debug)]
pub struct HDFWriter {
    file_handle: File,
}

fn write_str_attr(
    location: &hdf5::Location,
    name: &str,
    value: &str,
) -> Result<(), WriterError> {
    // Strings with interior NULs cannot be stored; keep the attribute but leave it empty
    let value = VarLenUnicode::from_str(value).unwrap_or_default();
    location
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn write_f64_attr(location: &hdf5::Location, name: &str, value: f64) -> Result<(), WriterError> {
    location
        .new_attr::<f64>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

impl HDFWriter {
    /// Create the writer, opening a file at path
    pub fn new(path: &Path) -> Result<Self, WriterError> {
        Ok(Self {
            file_handle: File::create(path)?,
        })
    }

    /// Write the spectrogram data matrix (time x frequency) with its metadata as attributes
    pub fn write_spectrogram(
        &self,
        spectrogram: &Spectrogram,
        params: &SpectrogramParams,
    ) -> Result<(), WriterError> {
        let metadata = SpectrogramMetadata::new(spectrogram, params);
        let dset = self
            .file_handle
            .new_dataset_builder()
            .with_data(spectrogram.data())
            .create(SPECTROGRAM_NAME)?;
        write_f64_attr(&dset, "epoch", metadata.epoch)?;
        write_f64_attr(&dset, "dt", metadata.dt)?;
        write_f64_attr(&dset, "f0", metadata.f0)?;
        write_f64_attr(&dset, "df", metadata.df)?;
        write_f64_attr(&dset, "fftlength", metadata.fftlength)?;
        write_f64_attr(&dset, "fftstride", metadata.fftstride)?;
        write_str_attr(&dset, "unit", &metadata.unit)?;
        write_str_attr(&dset, "channel", metadata.channel.as_deref().unwrap_or(""))?;
        write_str_attr(&dset, "utc", metadata.utc.as_deref().unwrap_or(""))?;
        write_str_attr(&dset, "method", &metadata.method)?;
        write_str_attr(&dset, "window", &metadata.window)?;
        write_str_attr(&dset, "version", &metadata.version)?;
        log::info!(
            "Wrote {} spectrogram to HDF5 dataset {SPECTROGRAM_NAME}",
            metadata.size
        );
        Ok(())
    }

    /// Write a set of named series (e.g. event rates) under the rates group
    pub fn write_rates(&self, rates: &[(String, &TimeSeries)]) -> Result<(), WriterError> {
        let group = match self.file_handle.group(RATES_NAME) {
            Ok(group) => group,
            Err(_) => self.file_handle.create_group(RATES_NAME)?,
        };
        for (name, series) in rates {
            let dset = group
                .new_dataset_builder()
                .with_data(series.data().view())
                .create(name.as_str())?;
            write_f64_attr(&dset, "epoch", series.epoch())?;
            write_f64_attr(&dset, "dt", series.dt())?;
            write_str_attr(&dset, "unit", &series.unit().to_string())?;
        }
        Ok(())
    }

    /// Flush and close the file
    pub fn close(self) -> Result<(), WriterError> {
        self.file_handle.flush()?;
        Ok(())
    }
}
