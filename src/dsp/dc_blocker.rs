//! Removes a slowly drifting DC bias from the raw stream.

use num_traits::Zero;

use crate::Sample;

#[derive(Debug, Clone)]
pub struct DcBlocker {
    /// Weight kept by the old estimate on each batch
    decay: f32,
    mean: Sample,
}

impl DcBlocker {
    pub fn new(decay: f32) -> Self {
        Self {
            decay,
            mean: Sample::zero(),
        }
    }

    /// Current DC estimate
    pub fn mean(&self) -> Sample {
        self.mean
    }

    /// Subtract the current estimate in place, then fold this batch's mean into it
    pub fn process(&mut self, samples: &mut [Sample]) {
        if samples.is_empty() {
            return;
        }
        let sum = samples.iter().fold(Sample::zero(), |acc, s| acc + s);
        let batch_mean = sum / samples.len() as f32;
        for s in samples.iter_mut() {
            *s -= self.mean;
        }
        self.mean = self.mean * self.decay + batch_mean * (1.0 - self.decay);
    }
}
