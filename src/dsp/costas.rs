//! Second-order Costas loop for tracking the beacon carrier.
//!
//! The loop works at the decimated rate. Besides the derotated output it
//! records, for every input sample, the phase advance its oscillator made
//! (radians per decimated sample). That sequence is what the full-rate path
//! integrates to remove the drift from the original samples.

use std::f32::consts::PI;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use num_complex::Complex;

use super::SampleStage;
use crate::Sample;

const DAMPING: f32 = std::f32::consts::FRAC_1_SQRT_2;
/// Bound on the frequency estimate, radians per sample
const MAX_FREQUENCY: f32 = 1.0;

/// Lock-free view of the loop frequency, published once per batch
#[derive(Debug, Clone, Default)]
pub struct LoopFrequency(Arc<AtomicU32>);

impl LoopFrequency {
    /// Radians per decimated sample
    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn set(&self, freq: f32) {
        self.0.store(freq.to_bits(), Ordering::Relaxed);
    }
}

pub struct CostasLoop {
    alpha: f32,
    beta: f32,
    phase: f32,
    freq: f32,
    shifts: Vec<f32>,
    published: LoopFrequency,
}

impl CostasLoop {
    pub fn new(bandwidth: f32) -> Self {
        let denom = 1.0 + 2.0 * DAMPING * bandwidth + bandwidth * bandwidth;
        Self {
            alpha: 4.0 * DAMPING * bandwidth / denom,
            beta: 4.0 * bandwidth * bandwidth / denom,
            phase: 0.0,
            freq: 0.0,
            shifts: Vec::new(),
            published: LoopFrequency::default(),
        }
    }

    /// Integrated frequency term, radians per sample
    pub fn frequency(&self) -> f32 {
        self.freq
    }

    /// Current oscillator phase
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Per-sample phase advance over the last processed batch
    pub fn frequency_shift(&self) -> &[f32] {
        &self.shifts
    }

    /// Handle other threads may poll for the frequency estimate
    pub fn telemetry(&self) -> LoopFrequency {
        self.published.clone()
    }

    /// Frequency estimate converted to Hz at the loop's sample rate
    pub fn frequency_hz(&self, sample_rate: f64) -> f64 {
        self.freq as f64 * sample_rate / (2.0 * std::f64::consts::PI)
    }

    #[inline]
    fn step(&mut self, s: Sample) -> (Sample, f32) {
        let out = s * Complex::from_polar(1.0, -self.phase);
        let error = (out.re * out.im).clamp(-1.0, 1.0);

        self.freq = (self.freq + self.beta * error).clamp(-MAX_FREQUENCY, MAX_FREQUENCY);
        let advance = self.freq + self.alpha * error;
        self.phase += advance;
        while self.phase > PI {
            self.phase -= 2.0 * PI;
        }
        while self.phase < -PI {
            self.phase += 2.0 * PI;
        }
        (out, advance)
    }
}

impl SampleStage for CostasLoop {
    fn process(&mut self, input: &[Sample], output: &mut Vec<Sample>) {
        output.clear();
        self.shifts.clear();
        for &s in input {
            let (out, advance) = self.step(s);
            output.push(out);
            self.shifts.push(advance);
        }
        self.published.set(self.freq);
    }
}
