//! Attack/decay automatic gain control.
//!
//! The gain chases a target output magnitude: it falls at the decay rate
//! while the output is above the reference and climbs at the attack rate
//! while it is below, always staying within `[0, max_gain]`.

use super::SampleStage;
use crate::config::AgcConfig;
use crate::Sample;

#[derive(Debug, Clone)]
pub struct Agc {
    attack_rate: f32,
    decay_rate: f32,
    reference: f32,
    gain: f32,
    max_gain: f32,
}

impl Agc {
    pub fn new(config: &AgcConfig) -> Self {
        Self {
            attack_rate: config.attack_rate,
            decay_rate: config.decay_rate,
            reference: config.reference,
            gain: config.gain.clamp(0.0, config.max_gain),
            max_gain: config.max_gain,
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    #[inline]
    pub fn execute(&mut self, s: Sample) -> Sample {
        let out = s * self.gain;
        let error = out.norm() - self.reference;
        let rate = if error > 0.0 {
            self.decay_rate
        } else {
            self.attack_rate
        };
        self.gain = (self.gain - rate * error).clamp(0.0, self.max_gain);
        out
    }
}

impl SampleStage for Agc {
    fn process(&mut self, input: &[Sample], output: &mut Vec<Sample>) {
        output.clear();
        output.extend(input.iter().map(|&s| self.execute(s)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use num_complex::Complex;

    fn config(gain: f32) -> AgcConfig {
        AgcConfig {
            attack_rate: 0.01,
            decay_rate: 0.2,
            reference: 1.0,
            gain,
            max_gain: 65535.0,
        }
    }

    #[test]
    fn test_length_preserving() {
        let mut agc = Agc::new(&config(10.0));
        let mut out = Vec::new();
        agc.process(&vec![Complex::new(0.5, 0.0); 123], &mut out);
        assert_eq!(out.len(), 123);
    }

    #[test]
    fn test_settles_on_reference() {
        let mut agc = Agc::new(&config(10.0));
        let mut out = Vec::new();
        agc.process(&vec![Complex::new(0.0, 0.5); 2000], &mut out);
        assert_relative_eq!(agc.gain(), 2.0, epsilon = 1e-3);
        assert_relative_eq!(out.last().unwrap().norm(), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_steady_state_is_idempotent() {
        // Input already at the reference with unity gain: the gain must not move
        let mut agc = Agc::new(&config(1.0));
        let input: Vec<Sample> = (0..500)
            .map(|i| Complex::from_polar(1.0, i as f32 * 0.1))
            .collect();
        let mut first = Vec::new();
        agc.process(&input, &mut first);
        let gain = agc.gain();
        let mut second = Vec::new();
        agc.process(&first, &mut second);
        assert_relative_eq!(agc.gain(), gain, epsilon = 1e-5);
        assert_relative_eq!(gain, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_gain_clamped() {
        let mut agc = Agc::new(&AgcConfig {
            max_gain: 4.0,
            ..config(1.0)
        });
        let mut out = Vec::new();
        agc.process(&vec![Complex::new(1e-3, 0.0); 10_000], &mut out);
        assert_eq!(agc.gain(), 4.0);

        // A huge sample drives the gain down, but never below zero
        agc.process(&[Complex::new(1e3, 0.0)], &mut out);
        assert_eq!(agc.gain(), 0.0);
        agc.process(&[Complex::new(1e3, 0.0)], &mut out);
        assert_eq!(out[0].norm(), 0.0);
        assert!(agc.gain() > 0.0);
    }
}
