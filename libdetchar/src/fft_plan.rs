use std::fmt;
use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use super::error::PsdError;

/// A reusable forward real-FFT plan for a fixed transform length.
///
/// The plan is immutable once created; every call to [FftPlan::power] allocates its own
/// scratch buffers, so a single plan can be shared between threads behind an `Arc`.
#[derive(Clone)]
pub struct FftPlan {
    length: usize,
    forward: Arc<dyn RealToComplex<f64>>,
}

impl fmt::Debug for FftPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftPlan")
            .field("length", &self.length)
            .finish()
    }
}

impl FftPlan {
    /// Create a new plan for transforms of `length` real samples
    pub fn new(length: usize) -> Result<Self, PsdError> {
        if length == 0 {
            return Err(PsdError::BadFftLength(length));
        }
        let forward = RealFftPlanner::<f64>::new().plan_fft_forward(length);
        Ok(Self { length, forward })
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Number of one-sided frequency bins produced by this plan
    pub fn n_frequencies(&self) -> usize {
        self.length / 2 + 1
    }

    /// Forward transform of `input`, which is consumed as scratch space.
    pub fn transform(&self, input: &mut [f64]) -> Result<Vec<Complex<f64>>, PsdError> {
        if input.len() != self.length {
            return Err(PsdError::PlanLength(self.length, input.len()));
        }
        let mut output = self.forward.make_output_vec();
        let mut scratch = self.forward.make_scratch_vec();
        self.forward
            .process_with_scratch(input, &mut output, &mut scratch)?;
        Ok(output)
    }

    /// Squared magnitude of the forward transform of `input`
    pub fn power(&self, input: &mut [f64]) -> Result<Vec<f64>, PsdError> {
        Ok(self
            .transform(input)?
            .into_iter()
            .map(|c| c.norm_sqr())
            .collect())
    }
}
