//! Frequency translation with a decimating low-pass.
//!
//! Every input sample is mixed by a rotator running at the mixing frequency,
//! the rotated stream goes through a windowed-sinc FIR and every `D`-th
//! filtered sample is kept. The mixing frequency lives in a
//! [`MixingFrequency`] cell that other threads may update at any time; it is
//! sampled once at the start of every [`FrequencyTranslator::process`] call.

use std::f64::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use num_complex::Complex;
use num_traits::Zero;

use super::SampleStage;
use crate::Sample;

/// Mixing frequency in Hz, shared between the processing loop and the control side
#[derive(Debug, Clone)]
pub struct MixingFrequency(Arc<AtomicU64>);

impl MixingFrequency {
    pub fn new(hz: f64) -> Self {
        Self(Arc::new(AtomicU64::new(hz.to_bits())))
    }

    pub fn set(&self, hz: f64) {
        self.0.store(hz.to_bits(), Ordering::Release);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }
}

pub struct FrequencyTranslator {
    decimation: usize,
    sample_rate: f64,
    taps: Vec<f32>,
    frequency: MixingFrequency,
    /// Frequency the rotator step was computed for
    active_frequency: f64,
    /// Current rotator value
    rot: Sample,
    /// Per-sample rotator step
    step: Sample,
    /// Last `taps.len() - 1` rotated samples followed by the current batch
    delay_line: Vec<Sample>,
}

impl FrequencyTranslator {
    /// # Panics
    /// Panics if `decimation` is 0 or `taps` is empty; [`crate::config::PipelineConfig::validate`]
    /// rules both out before a pipeline is built.
    pub fn new(
        decimation: usize,
        sample_rate: f64,
        taps: Vec<f32>,
        frequency: MixingFrequency,
    ) -> Self {
        assert!(decimation > 0, "Decimation factor must be greater than 0");
        assert!(!taps.is_empty(), "Translator needs at least one tap");
        let history = taps.len() - 1;
        let active_frequency = frequency.get();
        Self {
            decimation,
            sample_rate,
            step: rotator_step(active_frequency, sample_rate),
            taps,
            frequency,
            active_frequency,
            rot: Complex::new(1.0, 0.0),
            delay_line: vec![Sample::zero(); history],
        }
    }

    /// Publish a new mixing frequency. Takes effect on the next `process` call.
    pub fn set_frequency(&self, hz: f64) {
        self.frequency.set(hz);
    }

    /// Mixing frequency the next `process` call will use
    pub fn frequency(&self) -> f64 {
        self.frequency.get()
    }

    pub fn mixing_frequency(&self) -> MixingFrequency {
        self.frequency.clone()
    }

    pub fn decimation(&self) -> usize {
        self.decimation
    }

    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    /// Output length for an input of `len` samples
    pub fn output_len(&self, len: usize) -> usize {
        len / self.decimation
    }
}

fn rotator_step(hz: f64, sample_rate: f64) -> Sample {
    let w = 2.0 * PI * hz / sample_rate;
    Complex::new(w.cos() as f32, w.sin() as f32)
}

impl SampleStage for FrequencyTranslator {
    /// Emits `⌊L/D⌋` samples taken at positions `D-1, 2D-1, ...` of this call.
    /// The decimation grid restarts with every call, so batch lengths that are
    /// not a multiple of `D` space the output unevenly across batches and skew
    /// frequency estimates made downstream. Feed multiples of `D` where the
    /// source allows it.
    fn process(&mut self, input: &[Sample], output: &mut Vec<Sample>) {
        output.clear();

        let hz = self.frequency.get();
        if hz != self.active_frequency {
            self.active_frequency = hz;
            self.step = rotator_step(hz, self.sample_rate);
        }

        let history = self.taps.len() - 1;
        self.delay_line.reserve(input.len());
        for &s in input {
            self.delay_line.push(s * self.rot);
            self.rot *= self.step;
        }
        // Keep the rotator on the unit circle
        let norm = self.rot.norm();
        if norm > 0.0 {
            self.rot /= norm;
        }

        // Output k is the filter response at input position (k + 1) * D - 1,
        // i.e. delay line index history + (k + 1) * D - 1
        for k in 0..self.output_len(input.len()) {
            let end = history + (k + 1) * self.decimation;
            let window = &self.delay_line[end - self.taps.len()..end];
            let acc = window
                .iter()
                .rev()
                .zip(self.taps.iter())
                .fold(Sample::zero(), |acc, (s, t)| acc + *s * *t);
            output.push(acc);
        }

        let consumed = self.delay_line.len() - history;
        self.delay_line.drain(..consumed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::filter::low_pass;
    use approx::assert_relative_eq;

    fn translator(decimation: usize, hz: f64) -> FrequencyTranslator {
        let fs = 48_000.0;
        let cutoff = fs / decimation as f64 / 2.0 - 1_000.0;
        let taps = low_pass(1.0, fs, cutoff, 1_000.0).unwrap();
        FrequencyTranslator::new(decimation, fs, taps, MixingFrequency::new(hz))
    }

    fn tone(hz: f64, fs: f64, len: usize) -> Vec<Sample> {
        (0..len)
            .map(|i| Complex::from_polar(1.0, (2.0 * PI * hz * i as f64 / fs) as f32))
            .collect()
    }

    #[test]
    fn test_output_length_is_floor() {
        for decimation in [1, 2, 3, 5, 8] {
            let mut t = translator(decimation, 0.0);
            let d = t.decimation();
            let mut out = Vec::new();
            for len in [0, 1, 7, 31, 32, 33, 100, 1000] {
                t.process(&vec![Complex::new(1.0, 0.0); len], &mut out);
                assert_eq!(out.len(), len / d, "D = {}, L = {}", d, len);
            }
        }
    }

    #[test]
    fn test_tone_translated_to_dc() {
        // A tone at +3 kHz mixed by -3 kHz comes out as a constant
        let mut t = translator(4, -3_000.0);
        let mut out = Vec::new();
        t.process(&tone(3_000.0, 48_000.0, 8192), &mut out);
        let settled = &out[out.len() / 2..];
        let first = settled[0];
        assert_relative_eq!(first.norm(), 1.0, epsilon = 0.02);
        for s in settled {
            assert_relative_eq!(s.re, first.re, epsilon = 0.02);
            assert_relative_eq!(s.im, first.im, epsilon = 0.02);
        }
    }

    #[test]
    fn test_out_of_band_tone_rejected() {
        let mut t = translator(8, 0.0);
        let mut out = Vec::new();
        t.process(&tone(12_000.0, 48_000.0, 16384), &mut out);
        let peak = out[out.len() / 2..]
            .iter()
            .map(|s| s.norm())
            .fold(0.0f32, f32::max);
        assert!(peak < 0.01, "leakage {}", peak);
    }

    #[test]
    fn test_split_batches_match_single_batch() {
        let input = tone(1_000.0, 48_000.0, 4000);
        let mut whole = translator(4, -500.0);
        let mut expected = Vec::new();
        whole.process(&input, &mut expected);

        let mut split = translator(4, -500.0);
        let mut got = Vec::new();
        let mut out = Vec::new();
        for chunk in input.chunks(400) {
            split.process(chunk, &mut out);
            got.extend_from_slice(&out);
        }
        assert_eq!(got.len(), expected.len());
        for (a, b) in got.iter().zip(expected.iter()) {
            assert_relative_eq!(a.re, b.re, epsilon = 1e-3);
            assert_relative_eq!(a.im, b.im, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_retune_between_calls() {
        // 10 kHz sits outside the 5 kHz passband until the mixer moves it to DC
        let mut t = translator(4, 0.0);
        let mixing = t.mixing_frequency();
        let input = tone(10_000.0, 48_000.0, 16384);
        let (first, second) = input.split_at(8192);

        let mut out = Vec::new();
        t.process(first, &mut out);
        let leakage = out[out.len() / 2..]
            .iter()
            .map(|s| s.norm())
            .fold(0.0f32, f32::max);
        assert!(leakage < 0.01, "leakage {}", leakage);

        mixing.set(-10_000.0);
        t.process(second, &mut out);
        assert_eq!(out.len(), 2048);
        let settled = &out[out.len() / 2..];
        let first = settled[0];
        assert_relative_eq!(first.norm(), 1.0, epsilon = 0.02);
        for s in settled {
            assert_relative_eq!(s.re, first.re, epsilon = 0.02);
            assert_relative_eq!(s.im, first.im, epsilon = 0.02);
        }
    }

    #[test]
    fn test_decimation_grid_restarts_per_call() {
        // A single unit tap passes the mixed input straight through
        let mut t = FrequencyTranslator::new(4, 48_000.0, vec![1.0], MixingFrequency::new(0.0));
        let ramp: Vec<Sample> = (0..12).map(|i| Complex::new(i as f32, 0.0)).collect();
        let mut out = Vec::new();
        t.process(&ramp[..6], &mut out);
        assert_eq!(out, vec![Complex::new(3.0, 0.0)]);
        t.process(&ramp[6..], &mut out);
        assert_eq!(out, vec![Complex::new(9.0, 0.0)]);
    }

    #[test]
    fn test_set_frequency_applies_on_next_call() {
        let t = translator(2, -143_000.0);
        let handle = t.mixing_frequency();
        handle.set(-133_000.0);
        assert_eq!(t.frequency(), -133_000.0);
        t.set_frequency(-120_000.0);
        assert_eq!(handle.get(), -120_000.0);
    }
}
