use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use super::error::PsdError;

/// Window functions applied to each FFT segment before transforming.
///
/// Windows are symmetric-periodic ("DFT-even") as is conventional for spectral
/// estimation, i.e. a length-N window is the first N points of a length N+1 symmetric
/// window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    #[default]
    Hann,
    Hamming,
    Blackman,
    Tukey(f64),
    Boxcar,
}

impl Window {
    /// Generate the window values for an FFT of length `n`
    pub fn generate(&self, n: usize) -> Array1<f64> {
        match self {
            Self::Boxcar => Array1::ones(n),
            Self::Hann => cosine_sum(n, &[0.5, 0.5]),
            Self::Hamming => cosine_sum(n, &[0.54, 0.46]),
            Self::Blackman => cosine_sum(n, &[0.42, 0.5, 0.08]),
            Self::Tukey(alpha) => tukey(n, *alpha),
        }
    }
}

/// General cosine-sum window: a0 - a1 cos(2 pi k/N) + a2 cos(4 pi k/N) - ...
fn cosine_sum(n: usize, coefficients: &[f64]) -> Array1<f64> {
    Array1::from_shape_fn(n, |k| {
        let phase = 2.0 * PI * k as f64 / n as f64;
        coefficients
            .iter()
            .enumerate()
            .map(|(order, a)| {
                let sign = if order % 2 == 0 { 1.0 } else { -1.0 };
                sign * a * (order as f64 * phase).cos()
            })
            .sum()
    })
}

fn tukey(n: usize, alpha: f64) -> Array1<f64> {
    if alpha <= 0.0 {
        return Array1::ones(n);
    } else if alpha >= 1.0 {
        return cosine_sum(n, &[0.5, 0.5]);
    }
    let width = alpha * n as f64 / 2.0;
    Array1::from_shape_fn(n, |k| {
        let k = k as f64;
        if k < width {
            0.5 * (1.0 - (PI * k / width).cos())
        } else if k > n as f64 - width {
            0.5 * (1.0 - (PI * (n as f64 - k) / width).cos())
        } else {
            1.0
        }
    })
}

impl FromStr for Window {
    type Err = PsdError;

    /// Parse names like `hann`, `hanning`, `boxcar`, `tukey` (alpha 0.5) or `tukey:0.25`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let (name, arg) = match lower.split_once(':') {
            Some((n, a)) => (n, Some(a)),
            None => (lower.as_str(), None),
        };
        match (name, arg) {
            ("hann" | "hanning", None) => Ok(Self::Hann),
            ("hamming", None) => Ok(Self::Hamming),
            ("blackman", None) => Ok(Self::Blackman),
            ("boxcar" | "rectangular" | "none", None) => Ok(Self::Boxcar),
            ("tukey", None) => Ok(Self::Tukey(0.5)),
            ("tukey", Some(a)) => a
                .parse::<f64>()
                .map(Self::Tukey)
                .map_err(|_| PsdError::UnknownWindow(s.to_string())),
            _ => Err(PsdError::UnknownWindow(s.to_string())),
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hann => write!(f, "hann"),
            Self::Hamming => write!(f, "hamming"),
            Self::Blackman => write!(f, "blackman"),
            Self::Tukey(alpha) => write!(f, "tukey:{alpha}"),
            Self::Boxcar => write!(f, "boxcar"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_shape() {
        let w = Window::Hann.generate(8);
        assert_eq!(w.len(), 8);
        assert!(w[0].abs() < 1e-12);
        assert!((w[4] - 1.0).abs() < 1e-12);
        // periodic: w[k] == w[n-k]
        assert!((w[1] - w[7]).abs() < 1e-12);
    }

    #[test]
    fn test_tukey_limits() {
        let boxcar = Window::Tukey(0.0).generate(16);
        assert!(boxcar.iter().all(|v| *v == 1.0));
        let hann = Window::Tukey(1.0).generate(16);
        assert_eq!(hann, Window::Hann.generate(16));
        let mid = Window::Tukey(0.5).generate(16);
        assert_eq!(mid[8], 1.0);
        assert!(mid[0].abs() < 1e-12);
    }

    #[test]
    fn test_parse() {
        assert_eq!("hanning".parse::<Window>().unwrap(), Window::Hann);
        assert_eq!("tukey:0.25".parse::<Window>().unwrap(), Window::Tukey(0.25));
        assert!("kaiser".parse::<Window>().is_err());
    }
}
