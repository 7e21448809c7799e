//! Pipeline parameters and their validation.
//!
//! Everything here is fixed when the pipeline is built, except the center
//! frequency and beacon offset which [`crate::control`] may change while the
//! processing loop runs.

use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_SAMPLE_RATE: u32 = 1_800_000;
pub const DEFAULT_CENTER_FREQUENCY: u32 = 740_000_000;
pub const DEFAULT_BEACON_OFFSET: f64 = 143e3;
pub const DEFAULT_DECIMATION: u32 = 32;
pub const DEFAULT_DC_DECAY: f32 = 0.9;

pub const DEFAULT_TRANSLATOR_GAIN: f64 = 64.0;
pub const DEFAULT_TRANSLATOR_TRANSITION_WIDTH: f64 = 15e3;

pub const DEFAULT_AGC_ATTACK_RATE: f32 = 0.01;
pub const DEFAULT_AGC_DECAY_RATE: f32 = 0.2;
pub const DEFAULT_AGC_REFERENCE: f32 = 1.0;
pub const DEFAULT_AGC_GAIN: f32 = 10.0;
pub const DEFAULT_AGC_MAX_GAIN: f32 = 65535.0;

pub const DEFAULT_LOOP_BANDWIDTH: f32 = 0.01;

pub const DEFAULT_SPECTRUM_SIZE: usize = 1024;
pub const DEFAULT_SPECTRUM_FPS: u32 = 15;

/// How long the processing loop sleeps on an empty queue before rechecking
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    /// Complex samples per second delivered by the radio
    pub sample_rate: u32,
    /// Frequency the radio is tuned to, in Hz
    pub center_frequency: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgcConfig {
    pub attack_rate: f32,
    pub decay_rate: f32,
    pub reference: f32,
    /// Initial gain
    pub gain: f32,
    pub max_gain: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    /// Normalized loop bandwidth of the carrier tracking loop
    pub bandwidth: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranslationConfig {
    /// DC gain of the decimating low-pass
    pub gain: f64,
    /// Transition band width in Hz
    pub transition_width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingConfig {
    /// Offset of the beacon from the center frequency, in Hz
    pub beacon_offset: f64,
    pub decimation: u32,
    /// Per-batch decay of the DC estimate
    pub dc_decay: f32,
    pub agc: AgcConfig,
    pub costas: LoopConfig,
    pub translation: TranslationConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumConfig {
    /// Number of output bins
    pub size: usize,
    /// Snapshots per second, per kind
    pub fps: u32,
    /// Larger FFT and Blackman-Harris window when enough samples are available
    pub high_quality: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub processing: ProcessingConfig,
    pub spectrum: SpectrumConfig,
    pub poll_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig {
                sample_rate: DEFAULT_SAMPLE_RATE,
                center_frequency: DEFAULT_CENTER_FREQUENCY,
            },
            processing: ProcessingConfig {
                beacon_offset: DEFAULT_BEACON_OFFSET,
                decimation: DEFAULT_DECIMATION,
                dc_decay: DEFAULT_DC_DECAY,
                agc: AgcConfig {
                    attack_rate: DEFAULT_AGC_ATTACK_RATE,
                    decay_rate: DEFAULT_AGC_DECAY_RATE,
                    reference: DEFAULT_AGC_REFERENCE,
                    gain: DEFAULT_AGC_GAIN,
                    max_gain: DEFAULT_AGC_MAX_GAIN,
                },
                costas: LoopConfig {
                    bandwidth: DEFAULT_LOOP_BANDWIDTH,
                },
                translation: TranslationConfig {
                    gain: DEFAULT_TRANSLATOR_GAIN,
                    transition_width: DEFAULT_TRANSLATOR_TRANSITION_WIDTH,
                },
            },
            spectrum: SpectrumConfig {
                size: DEFAULT_SPECTRUM_SIZE,
                fps: DEFAULT_SPECTRUM_FPS,
                high_quality: false,
            },
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PipelineConfig {
    /// Sample rate after the translator decimates
    pub fn segment_sample_rate(&self) -> f64 {
        self.source.sample_rate as f64 / self.processing.decimation as f64
    }

    /// Cutoff of the translator low-pass: half the segment rate minus the transition band
    pub fn translator_cutoff(&self) -> f64 {
        self.segment_sample_rate() / 2.0 - self.processing.translation.transition_width
    }

    /// Absolute frequency of the beacon, fixed for the lifetime of a pipeline
    pub fn beacon_absolute_frequency(&self) -> f64 {
        self.source.center_frequency as f64 + self.processing.beacon_offset
    }

    pub fn validate(&self) -> Result<()> {
        let fs = self.source.sample_rate;
        let p = &self.processing;
        if fs == 0 {
            return Err(Error::config("sample rate must be positive"));
        }
        if p.decimation == 0 {
            return Err(Error::config("decimation must be at least 1"));
        }
        if p.decimation > fs {
            return Err(Error::config(format!(
                "decimation {} exceeds sample rate {} Hz",
                p.decimation, fs
            )));
        }
        if !p.beacon_offset.is_finite() || p.beacon_offset.abs() >= fs as f64 / 2.0 {
            return Err(Error::config(format!(
                "beacon offset {} Hz lies outside the {} Hz wide band",
                p.beacon_offset, fs
            )));
        }
        if !(0.0..1.0).contains(&p.dc_decay) {
            return Err(Error::config("DC decay must lie in [0, 1)"));
        }
        let tw = p.translation.transition_width;
        if !tw.is_finite() || tw <= 0.0 {
            return Err(Error::config("transition width must be positive"));
        }
        if !p.translation.gain.is_finite() || p.translation.gain <= 0.0 {
            return Err(Error::config("translator gain must be positive"));
        }
        if self.translator_cutoff() <= 0.0 {
            return Err(Error::config(format!(
                "transition width {} Hz leaves no passband at {} Hz segment rate",
                tw,
                self.segment_sample_rate()
            )));
        }
        let agc = &p.agc;
        let rates_ok = [agc.attack_rate, agc.decay_rate]
            .iter()
            .all(|r| r.is_finite() && *r >= 0.0);
        if !rates_ok {
            return Err(Error::config("AGC rates must be finite and non-negative"));
        }
        if !agc.reference.is_finite() || agc.reference <= 0.0 {
            return Err(Error::config("AGC reference must be positive"));
        }
        if !agc.max_gain.is_finite() || agc.max_gain <= 0.0 {
            return Err(Error::config("AGC max gain must be positive"));
        }
        if !(0.0..=agc.max_gain).contains(&agc.gain) {
            return Err(Error::config(format!(
                "AGC initial gain {} outside [0, {}]",
                agc.gain, agc.max_gain
            )));
        }
        if !(p.costas.bandwidth > 0.0 && p.costas.bandwidth < 1.0) {
            return Err(Error::config("loop bandwidth must lie in (0, 1)"));
        }
        let n = self.spectrum.size;
        if n < 2 || !n.is_power_of_two() {
            return Err(Error::config(format!(
                "spectrum size {} is not a power of two",
                n
            )));
        }
        if self.spectrum.fps == 0 {
            return Err(Error::config("spectrum rate must be at least one per second"));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::config("poll interval must be non-zero"));
        }
        Ok(())
    }
}
