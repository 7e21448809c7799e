//! Final derotation of the full-rate samples.

use std::f32::consts::PI;

use num_complex::Complex;

use crate::Sample;

const TWO_PI: f32 = 2.0 * PI;
const ONE_OVER_TWO_PI: f32 = 1.0 / TWO_PI;

#[derive(Debug, Clone, Default)]
pub struct PhaseCorrector {
    phase: f32,
}

impl PhaseCorrector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_phase(phase: f32) -> Self {
        Self {
            phase: wrap(phase),
        }
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Rotate each sample by the running phase, then retard the phase by that
    /// sample's frequency error. `samples` and `errors` must be the same length.
    pub fn process(&mut self, samples: &mut [Sample], errors: &[f32]) {
        debug_assert_eq!(samples.len(), errors.len());
        for (s, &e) in samples.iter_mut().zip(errors) {
            *s *= Complex::from_polar(1.0, self.phase);
            self.phase = wrap(self.phase - e);
        }
    }
}

/// Bring a phase back into (-2pi, 2pi), keeping its fractional turn
#[inline]
fn wrap(phase: f32) -> f32 {
    if phase >= TWO_PI || phase <= -TWO_PI {
        (phase * ONE_OVER_TWO_PI).fract() * TWO_PI
    } else {
        phase
    }
}
