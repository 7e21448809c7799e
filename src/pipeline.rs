//! The fixed stage chain applied to every batch.

use tracing::{debug, info, warn};

use crate::buffers::ScratchBuffers;
use crate::config::PipelineConfig;
use crate::dsp::{
    filter, Agc, CostasLoop, DcBlocker, FrequencyTranslator, LoopFrequency, MixingFrequency,
    PhaseCorrector, RateInterpolator,
};
use crate::error::Result;
use crate::Sample;

/// All per-stream DSP state, owned by the processing thread
pub struct Pipeline {
    sample_rate: f64,
    segment_rate: f64,
    dc: DcBlocker,
    translator: FrequencyTranslator,
    agc: Agc,
    costas: CostasLoop,
    interpolator: RateInterpolator,
    corrector: PhaseCorrector,
    scratch: ScratchBuffers,
    full_rate_errors: Vec<f32>,
}

impl Pipeline {
    /// Build every stage from `config`. The translator mixes at `mixing`,
    /// which the control side keeps publishing into.
    pub fn new(config: &PipelineConfig, mixing: MixingFrequency) -> Result<Self> {
        config.validate()?;
        let p = &config.processing;
        let sample_rate = config.source.sample_rate as f64;
        let segment_rate = config.segment_sample_rate();
        let decimation = p.decimation as usize;

        let taps = filter::low_pass(
            p.translation.gain,
            sample_rate,
            config.translator_cutoff(),
            p.translation.transition_width,
        )?;
        info!("Translator taps length: {}", taps.len());
        info!("Output sample rate: {} Hz", segment_rate);
        debug!("Mixing frequency: {} Hz", mixing.get());

        Ok(Self {
            sample_rate,
            segment_rate,
            dc: DcBlocker::new(p.dc_decay),
            translator: FrequencyTranslator::new(decimation, sample_rate, taps, mixing),
            agc: Agc::new(&p.agc),
            costas: CostasLoop::new(p.costas.bandwidth),
            interpolator: RateInterpolator::new(decimation),
            corrector: PhaseCorrector::new(),
            scratch: ScratchBuffers::new(),
            full_rate_errors: Vec::new(),
        })
    }

    /// Correct `batch` in place. Returns `false` (and touches nothing) for an
    /// empty batch or one holding a NaN or infinite sample.
    pub fn process(&mut self, batch: &mut [Sample]) -> bool {
        if batch.is_empty() {
            return false;
        }
        if !batch.iter().all(|s| s.re.is_finite() && s.im.is_finite()) {
            warn!("Dropping batch of {} samples with non-finite values", batch.len());
            return false;
        }
        self.dc.process(batch);

        self.scratch.load(batch);
        self.scratch.apply(&mut self.translator);
        self.scratch.apply(&mut self.agc);
        self.scratch.apply(&mut self.costas);

        self.interpolator.process(
            self.costas.frequency_shift(),
            batch.len(),
            &mut self.full_rate_errors,
        );
        self.corrector.process(batch, &self.full_rate_errors);
        true
    }

    /// Decimated, gain-normalized, carrier-locked samples of the last batch
    pub fn segment(&self) -> &[Sample] {
        self.scratch.current()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn segment_sample_rate(&self) -> f64 {
        self.segment_rate
    }

    pub fn translator(&self) -> &FrequencyTranslator {
        &self.translator
    }

    pub fn costas(&self) -> &CostasLoop {
        &self.costas
    }

    pub fn loop_telemetry(&self) -> LoopFrequency {
        self.costas.telemetry()
    }

    /// Residual beacon offset seen by the tracking loop, in Hz
    pub fn lock_offset_hz(&self) -> f64 {
        self.costas.frequency_hz(self.segment_rate)
    }

    pub fn correction_phase(&self) -> f32 {
        self.corrector.phase()
    }

    pub fn agc_gain(&self) -> f32 {
        self.agc.gain()
    }

    pub fn scratch_capacity(&self) -> usize {
        self.scratch.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use approx::assert_relative_eq;
    use num_complex::Complex;
    use std::f64::consts::PI;

    fn test_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.processing.translation.gain = 1.0;
        config
    }

    /// Tone at `offset` Hz from the center, `len` samples starting at sample `start`
    fn tone(offset: f64, fs: f64, start: usize, len: usize) -> Vec<Sample> {
        (start..start + len)
            .map(|i| {
                let phase = (2.0 * PI * offset * i as f64 / fs).rem_euclid(2.0 * PI);
                Complex::from_polar(0.5, phase as f32)
            })
            .collect()
    }

    fn pipeline(config: &PipelineConfig) -> Pipeline {
        let mixing = MixingFrequency::new(-config.processing.beacon_offset);
        Pipeline::new(config, mixing).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = test_config();
        config.source.sample_rate = 0;
        let result = Pipeline::new(&config, MixingFrequency::new(0.0));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_lengths_through_pipeline() {
        let config = test_config();
        let mut p = pipeline(&config);
        for len in [1usize, 31, 32, 1000, 65_535] {
            let mut batch = tone(143e3, 1.8e6, 0, len);
            assert!(p.process(&mut batch));
            assert_eq!(batch.len(), len);
            assert_eq!(p.segment().len(), len / 32);
        }
    }

    #[test]
    fn test_empty_batch_skipped() {
        let config = test_config();
        let mut p = pipeline(&config);
        let mut batch = tone(143e3, 1.8e6, 0, 4096);
        p.process(&mut batch);
        let phase = p.correction_phase();
        let gain = p.agc_gain();
        assert!(!p.process(&mut []));
        assert_eq!(p.correction_phase(), phase);
        assert_eq!(p.agc_gain(), gain);
    }

    #[test]
    fn test_non_finite_batch_skipped() {
        let config = test_config();
        let fs = config.source.sample_rate as f64;
        let mut p = pipeline(&config);
        let len = 65_536;
        let mut start = 0;
        for _ in 0..4 {
            let mut batch = tone(143e3, fs, start, len);
            assert!(p.process(&mut batch));
            start += len;
        }
        let phase = p.correction_phase();
        let gain = p.agc_gain();

        for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let mut batch = tone(143e3, fs, start, len);
            batch[10].re = bad;
            assert!(!p.process(&mut batch));
            batch[10] = Complex::new(0.0, bad);
            assert!(!p.process(&mut batch));
        }
        assert_eq!(p.correction_phase(), phase);
        assert_eq!(p.agc_gain(), gain);

        for _ in 0..20 {
            let mut batch = tone(143e3, fs, start, len);
            assert!(p.process(&mut batch));
            assert!(batch.iter().all(|s| s.re.is_finite() && s.im.is_finite()));
            start += len;
        }
        assert!(p.agc_gain().is_finite());
        assert!(p.correction_phase().is_finite());
        assert!(p.lock_offset_hz().is_finite());
    }

    #[test]
    fn test_scratch_grows_to_largest_batch() {
        let config = test_config();
        let mut p = pipeline(&config);
        for len in [100, 500, 200] {
            let mut batch = tone(143e3, 1.8e6, 0, len);
            p.process(&mut batch);
        }
        assert!(p.scratch_capacity() >= 500);
    }

    #[test]
    fn test_tracks_drifted_beacon() {
        // Beacon drifted 500 Hz above where it is expected
        let config = test_config();
        let fs = config.source.sample_rate as f64;
        let mut p = pipeline(&config);
        let total = (fs * 0.5) as usize;
        let batch_len = 65_535;
        let mut start = 0;
        let mut last = Vec::new();
        while start < total {
            let len = batch_len.min(total - start);
            let mut batch = tone(143e3 + 500.0, fs, start, len);
            p.process(&mut batch);
            last = batch;
            start += len;
        }
        assert_relative_eq!(p.lock_offset_hz(), 500.0, epsilon = 5.0);

        // The corrected stream carries the beacon back at its nominal offset
        let tail = &last[last.len() - 10_000..];
        let mean_step = tail
            .windows(2)
            .map(|w| (w[1] * w[0].conj()).arg() as f64)
            .sum::<f64>()
            / (tail.len() - 1) as f64;
        let measured = mean_step * fs / (2.0 * PI);
        assert_relative_eq!(measured, 143e3, epsilon = 5.0);
    }
}
