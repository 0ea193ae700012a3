//! Averaged power spectral density estimation.
//!
//! A series is cut into segments of `nfft` samples starting every `nstride` samples,
//! each segment is windowed and transformed, and the per-segment periodograms are
//! combined with one of the [AverageMethod]s. Output is a one-sided density.
use ndarray::{Array1, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::PsdError;
use super::fft_plan::FftPlan;
use super::window::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AverageMethod {
    /// Mean of overlapping segments
    #[default]
    Welch,
    /// Mean of non-overlapping segments; the FFT stride is ignored
    Bartlett,
    /// Bias-corrected median of overlapping segments
    Median,
    /// Mean of the bias-corrected medians of the even and odd segments
    MedianMean,
}

impl FromStr for AverageMethod {
    type Err = PsdError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "welch" => Ok(Self::Welch),
            "bartlett" => Ok(Self::Bartlett),
            "median" => Ok(Self::Median),
            "median-mean" => Ok(Self::MedianMean),
            _ => Err(PsdError::UnknownMethod(s.to_string())),
        }
    }
}

impl fmt::Display for AverageMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Welch => write!(f, "welch"),
            Self::Bartlett => write!(f, "bartlett"),
            Self::Median => write!(f, "median"),
            Self::MedianMean => write!(f, "median-mean"),
        }
    }
}

/// Ratio of the sample median to the mean of `n` exponentially distributed values.
pub fn median_bias(n: usize) -> f64 {
    let mut bias = 1.0;
    for i in 1..=(n.saturating_sub(1) / 2) {
        bias -= 1.0 / (2 * i) as f64;
        bias += 1.0 / (2 * i + 1) as f64;
    }
    bias
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n == 0 {
        0.0
    } else if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}

/// Bias-corrected median across the rows of `segments`, per frequency bin
fn median_of_rows(segments: &[Array1<f64>]) -> Array1<f64> {
    let nfreqs = segments.first().map_or(0, |s| s.len());
    let bias = median_bias(segments.len());
    let mut column = vec![0.0; segments.len()];
    Array1::from_shape_fn(nfreqs, |k| {
        for (value, segment) in column.iter_mut().zip(segments) {
            *value = segment[k];
        }
        median(&mut column) / bias
    })
}

fn mean_of_rows(segments: &[Array1<f64>]) -> Array1<f64> {
    let views: Vec<_> = segments.iter().map(|s| s.view()).collect();
    match ndarray::stack(Axis(0), &views) {
        Ok(stacked) => stacked
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(0)),
        Err(_) => Array1::zeros(0),
    }
}

/// One-sided periodogram of every segment
fn periodograms(
    data: ArrayView1<f64>,
    sample_rate: f64,
    nstride: usize,
    window: &Array1<f64>,
    plan: &FftPlan,
) -> Result<Vec<Array1<f64>>, PsdError> {
    let nfft = plan.len();
    let nsegments = (data.len() - nfft) / nstride + 1;
    let scale = 1.0 / (sample_rate * window.iter().map(|w| w * w).sum::<f64>());
    let nyquist = if nfft % 2 == 0 {
        Some(nfft / 2)
    } else {
        None
    };

    let mut buffer = vec![0.0; nfft];
    let mut out = Vec::with_capacity(nsegments);
    for segment in 0..nsegments {
        let start = segment * nstride;
        for ((b, x), w) in buffer
            .iter_mut()
            .zip(data.iter().skip(start))
            .zip(window.iter())
        {
            *b = x * w;
        }
        let power = plan.power(&mut buffer)?;
        let row = Array1::from_iter(power.into_iter().enumerate().map(|(k, p)| {
            if k == 0 || Some(k) == nyquist {
                p * scale
            } else {
                2.0 * p * scale
            }
        }));
        out.push(row);
    }
    Ok(out)
}

/// Average PSD of `data` using FFTs of `nfft` samples every `nstride` samples.
///
/// Returns `nfft / 2 + 1` one-sided density values with resolution `sample_rate / nfft`.
pub fn average_psd(
    data: ArrayView1<f64>,
    sample_rate: f64,
    nfft: usize,
    nstride: usize,
    method: AverageMethod,
    window: Option<&Array1<f64>>,
    plan: Option<&FftPlan>,
) -> Result<Array1<f64>, PsdError> {
    if nfft == 0 {
        return Err(PsdError::BadFftLength(nfft));
    }
    let nstride = match method {
        AverageMethod::Bartlett => nfft,
        _ => nstride,
    };
    if nstride == 0 {
        return Err(PsdError::BadFftStride(nstride));
    }
    if data.len() < nfft {
        return Err(PsdError::SeriesTooShort(data.len(), nfft));
    }

    let generated_window;
    let window = match window {
        Some(w) if w.len() != nfft => return Err(PsdError::WindowLength(w.len(), nfft)),
        Some(w) => w,
        None => {
            generated_window = Window::default().generate(nfft);
            &generated_window
        }
    };
    let generated_plan;
    let plan = match plan {
        Some(p) if p.len() != nfft => return Err(PsdError::PlanLength(p.len(), nfft)),
        Some(p) => p,
        None => {
            generated_plan = FftPlan::new(nfft)?;
            &generated_plan
        }
    };

    let segments = periodograms(data, sample_rate, nstride, window, plan)?;
    Ok(match method {
        AverageMethod::Welch | AverageMethod::Bartlett => mean_of_rows(&segments),
        AverageMethod::Median => median_of_rows(&segments),
        AverageMethod::MedianMean => {
            if segments.len() < 2 {
                median_of_rows(&segments)
            } else {
                let (even, odd): (Vec<_>, Vec<_>) = segments
                    .into_iter()
                    .enumerate()
                    .partition(|(i, _)| i % 2 == 0);
                let even: Vec<_> = even.into_iter().map(|(_, s)| s).collect();
                let odd: Vec<_> = odd.into_iter().map(|(_, s)| s).collect();
                (median_of_rows(&even) + median_of_rows(&odd)) / 2.0
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(n: usize, sample_rate: f64, frequency: f64, amplitude: f64) -> Array1<f64> {
        Array1::from_shape_fn(n, |i| {
            amplitude * (2.0 * PI * frequency * i as f64 / sample_rate).sin()
        })
    }

    #[test]
    fn test_zeros_give_zero_psd() {
        let data = Array1::<f64>::zeros(256);
        for method in [
            AverageMethod::Welch,
            AverageMethod::Bartlett,
            AverageMethod::Median,
            AverageMethod::MedianMean,
        ] {
            let psd = average_psd(data.view(), 64.0, 64, 32, method, None, None).unwrap();
            assert_eq!(psd.len(), 33);
            assert!(psd.iter().all(|v| *v == 0.0), "{method} gave non-zero PSD");
        }
    }

    #[test]
    fn test_sine_peak() {
        let data = sine(1024, 128.0, 16.0, 1.0);
        let psd = average_psd(data.view(), 128.0, 128, 64, AverageMethod::Welch, None, None)
            .unwrap();
        let peak = psd
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        // df = 1 Hz
        assert_eq!(peak, 16);
    }

    #[test]
    fn test_sine_power_boxcar() {
        // integrated one-sided PSD of a unit sine is its mean square (df = 1 Hz)
        let data = sine(512, 64.0, 8.0, 1.0);
        let window = Window::Boxcar.generate(64);
        let psd = average_psd(
            data.view(),
            64.0,
            64,
            64,
            AverageMethod::Welch,
            Some(&window),
            None,
        )
        .unwrap();
        let total: f64 = psd.sum();
        assert!((total - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_median_bias() {
        assert_eq!(median_bias(1), 1.0);
        assert_eq!(median_bias(2), 1.0);
        assert!((median_bias(3) - (1.0 - 0.5 + 1.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_errors() {
        let data = Array1::<f64>::zeros(32);
        assert!(matches!(
            average_psd(data.view(), 1.0, 64, 32, AverageMethod::Welch, None, None),
            Err(PsdError::SeriesTooShort(32, 64))
        ));
        assert!(matches!(
            average_psd(data.view(), 1.0, 16, 0, AverageMethod::Welch, None, None),
            Err(PsdError::BadFftStride(0))
        ));
        let window = Window::Hann.generate(8);
        assert!(matches!(
            average_psd(data.view(), 1.0, 16, 8, AverageMethod::Welch, Some(&window), None),
            Err(PsdError::WindowLength(8, 16))
        ));
        let plan = FftPlan::new(8).unwrap();
        assert!(matches!(
            average_psd(data.view(), 1.0, 16, 8, AverageMethod::Welch, None, Some(&plan)),
            Err(PsdError::PlanLength(8, 16))
        ));
    }

    #[test]
    fn test_method_names() {
        assert_eq!(
            "median_mean".parse::<AverageMethod>().unwrap(),
            AverageMethod::MedianMean
        );
        assert_eq!(AverageMethod::MedianMean.to_string(), "median-mean");
        assert!("lomb".parse::<AverageMethod>().is_err());
    }
}
