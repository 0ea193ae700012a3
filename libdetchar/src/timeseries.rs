use ndarray::{s, ArcArray1, Array1};
use std::ops::Range;

use super::error::PsdError;
use super::fft_plan::FftPlan;
use super::frequency_series::FrequencySeries;
use super::psd::{self, AverageMethod};
use super::units::{spectral_density_unit, Unit};

/// A regularly sampled, immutable series of real samples.
///
/// The samples live in shared storage, so slicing and cloning never copy data; a
/// slice of a series is itself a `TimeSeries` whose epoch is shifted accordingly.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    data: ArcArray1<f64>,
    sample_rate: f64,
    epoch: f64,
    unit: Unit,
    channel: Option<String>,
}

impl TimeSeries {
    /// Create a new TimeSeries. `epoch` is the GPS time of the first sample.
    pub fn new(data: Array1<f64>, sample_rate: f64, epoch: f64, unit: Unit) -> Self {
        Self {
            data: data.into_shared(),
            sample_rate,
            epoch,
            unit,
            channel: None,
        }
    }

    pub fn with_channel(mut self, channel: &str) -> Self {
        self.channel = Some(channel.to_string());
        self
    }

    pub fn data(&self) -> &ArcArray1<f64> {
        &self.data
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn epoch(&self) -> f64 {
        self.epoch
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample spacing in seconds
    pub fn dt(&self) -> f64 {
        1.0 / self.sample_rate
    }

    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.sample_rate
    }

    /// Semi-open GPS interval `[epoch, epoch + duration)` covered by this series
    pub fn span(&self) -> (f64, f64) {
        (self.epoch, self.epoch + self.duration())
    }

    /// GPS time of every sample
    pub fn times(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.len(), |i| self.epoch + i as f64 / self.sample_rate)
    }

    /// View the samples in `range`. The end of the range is clipped to the series length.
    pub fn slice(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        Self {
            data: self.data.clone().slice_move(s![start..end]),
            sample_rate: self.sample_rate,
            epoch: self.epoch + start as f64 / self.sample_rate,
            unit: self.unit.clone(),
            channel: self.channel.clone(),
        }
    }

    /// Estimate the one-sided power spectral density of this series.
    ///
    /// `fftlength` and `fftstride` are in seconds. `window` must have one value per FFT
    /// sample; when `None` a Hann window is used. A `plan` of the matching length is
    /// reused when given, otherwise one is created for this call.
    pub fn psd(
        &self,
        fftlength: f64,
        fftstride: f64,
        method: AverageMethod,
        window: Option<&Array1<f64>>,
        plan: Option<&FftPlan>,
    ) -> Result<FrequencySeries, PsdError> {
        let nfft = (fftlength * self.sample_rate).round() as usize;
        let nstride = (fftstride * self.sample_rate).round() as usize;
        let data = psd::average_psd(
            self.data.view(),
            self.sample_rate,
            nfft,
            nstride,
            method,
            window,
            plan,
        )?;
        let mut out = FrequencySeries::new(
            data,
            0.0,
            self.sample_rate / nfft as f64,
            self.epoch,
            spectral_density_unit(&self.unit).into_unit(),
        );
        if let Some(ch) = &self.channel {
            out = out.with_channel(ch);
        }
        Ok(out)
    }
}
