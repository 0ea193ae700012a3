use ndarray::Array1;

use super::units::Unit;

/// A one-sided spectrum sampled on a regular frequency grid.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencySeries {
    data: Array1<f64>,
    f0: f64,
    df: f64,
    epoch: f64,
    unit: Unit,
    channel: Option<String>,
}

impl FrequencySeries {
    pub fn new(data: Array1<f64>, f0: f64, df: f64, epoch: f64, unit: Unit) -> Self {
        Self {
            data,
            f0,
            df,
            epoch,
            unit,
            channel: None,
        }
    }

    pub fn with_channel(mut self, channel: &str) -> Self {
        self.channel = Some(channel.to_string());
        self
    }

    pub fn data(&self) -> &Array1<f64> {
        &self.data
    }

    pub fn into_data(self) -> Array1<f64> {
        self.data
    }

    pub fn f0(&self) -> f64 {
        self.f0
    }

    pub fn df(&self) -> f64 {
        self.df
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

    pub fn frequencies(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.len(), |i| self.f0 + i as f64 * self.df)
    }

    /// Index of the bin with the most power, if any
    pub fn peak_bin(&self) -> Option<usize> {
        self.data
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }
}
