//! Averaged log-power spectra for monitoring.
//!
//! Two lineages are kept, one over the decimated segment around the beacon
//! and one over the full corrected band. Each carries its own averaging
//! state in a [`SpectrumAverager`]; published snapshots are independent
//! copies.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use num_traits::Zero;
use rustfft::{Fft, FftPlanner};

use crate::dsp::filter::{blackman_harris, hamming};
use crate::Sample;

/// Working FFT sizes tried in high quality mode, smallest first
const FFT_CANDIDATES: [usize; 5] = [1024, 2048, 4096, 8192, 16384];
/// Weight of the history in the exponential average is (A - 1) / A
const AVERAGING: f32 = 2.0;
/// Share of the previous output bin mixed into each bin
const SPATIAL_MIX: f32 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpectrumKind {
    /// Decimated segment around the beacon
    Segment,
    /// Full corrected band
    FullBand,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumSnapshot {
    pub kind: SpectrumKind,
    pub sample_rate: f64,
    /// Power in dB, lowest frequency first, DC at `len / 2`
    pub bins: Vec<f32>,
}

/// Averaging history of one spectrum lineage
#[derive(Debug, Clone)]
pub struct SpectrumAverager {
    kind: SpectrumKind,
    last: Vec<f32>,
}

impl SpectrumAverager {
    pub fn new(kind: SpectrumKind, size: usize) -> Self {
        Self {
            kind,
            last: vec![0.0; size],
        }
    }

    pub fn kind(&self) -> SpectrumKind {
        self.kind
    }

    pub fn last(&self) -> &[f32] {
        &self.last
    }
}

pub struct SpectrumEstimator {
    size: usize,
    high_quality: bool,
    fft: Option<Arc<dyn Fft<f32>>>,
    window: Vec<f32>,
    work: Vec<Sample>,
    scratch: Vec<Sample>,
}

impl SpectrumEstimator {
    /// # Panics
    /// Panics if `size` is not a power of two
    pub fn new(size: usize, high_quality: bool) -> Self {
        assert!(size.is_power_of_two(), "Spectrum size must be a power of two");
        Self {
            size,
            high_quality,
            fft: None,
            window: Vec::new(),
            work: Vec::new(),
            scratch: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// FFT length the current plan and window were built for
    pub fn planned_size(&self) -> Option<usize> {
        if self.window.is_empty() {
            None
        } else {
            Some(self.window.len())
        }
    }

    /// FFT length used for an input of `available` samples
    pub fn working_size(&self, available: usize) -> usize {
        let mut n = self.size;
        if self.high_quality {
            for &candidate in FFT_CANDIDATES.iter() {
                if candidate > n && candidate <= available {
                    n = candidate;
                } else if candidate > n {
                    break;
                }
            }
        }
        n
    }

    fn prepare(&mut self, n: usize) {
        if self.window.len() == n {
            return;
        }
        self.window = if self.high_quality {
            blackman_harris(n)
        } else {
            hamming(n)
        };
        let fft = FftPlanner::new().plan_fft_forward(n);
        self.scratch = vec![Sample::zero(); fft.get_inplace_scratch_len()];
        self.fft = Some(fft);
    }

    /// Compute the next snapshot of `averager`'s lineage from `samples`
    pub fn compute(
        &mut self,
        sample_rate: f64,
        samples: &[Sample],
        averager: &mut SpectrumAverager,
    ) -> SpectrumSnapshot {
        let n = self.working_size(samples.len());
        self.prepare(n);

        self.work.clear();
        self.work.extend(
            samples
                .iter()
                .take(n)
                .zip(self.window.iter())
                .map(|(s, w)| *s * *w),
        );
        self.work.resize(n, Sample::zero());

        if let Some(fft) = &self.fft {
            fft.process_with_scratch(&mut self.work, &mut self.scratch);
        }

        let size = self.size;
        let group = n / size;
        let inv_rate = 1.0 / sample_rate as f32;
        let mut bins = vec![0.0f32; size];
        for o in 0..size {
            let i = (o + size / 2) % size;
            let db = self.work[i * group..(i + 1) * group]
                .iter()
                .map(|x| 10.0 * (x.norm_sqr() * inv_rate).log10())
                .sum::<f32>()
                / group as f32;

            let mut v = (averager.last[o] * (AVERAGING - 1.0) + db) / AVERAGING;
            if !v.is_finite() {
                v = 0.0;
            }
            if o > 0 {
                v = bins[o - 1] * SPATIAL_MIX + v * (1.0 - SPATIAL_MIX);
            }
            bins[o] = v;
        }

        averager.last.copy_from_slice(&bins);
        SpectrumSnapshot {
            kind: averager.kind,
            sample_rate,
            bins,
        }
    }
}

/// Non-blocking publication where a newer snapshot replaces an unread one
#[derive(Clone)]
pub struct SpectrumPublisher {
    sender: Sender<SpectrumSnapshot>,
    stale: Receiver<SpectrumSnapshot>,
}

impl SpectrumPublisher {
    pub fn channel() -> (Self, Receiver<SpectrumSnapshot>) {
        let (sender, receiver) = bounded(1);
        let publisher = Self {
            sender,
            stale: receiver.clone(),
        };
        (publisher, receiver)
    }

    /// Never blocks. An unread snapshot still in the slot is discarded.
    pub fn publish(&self, snapshot: SpectrumSnapshot) {
        let mut snapshot = snapshot;
        // We hold a receiver ourselves, so the channel can't disconnect
        while let Err(TrySendError::Full(s)) = self.sender.try_send(snapshot) {
            let _ = self.stale.try_recv();
            snapshot = s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use num_complex::Complex;
    use std::f64::consts::PI;

    fn tone(bin: f64, n: usize, len: usize) -> Vec<Sample> {
        (0..len)
            .map(|i| {
                let phase = (2.0 * PI * bin * i as f64 / n as f64).rem_euclid(2.0 * PI);
                Complex::from_polar(1.0, phase as f32)
            })
            .collect()
    }

    fn peak(bins: &[f32]) -> usize {
        bins.iter()
            .enumerate()
            .fold((0, f32::MIN), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
            .0
    }

    #[test]
    fn test_length_standard_mode() {
        let mut est = SpectrumEstimator::new(1024, false);
        let mut avg = SpectrumAverager::new(SpectrumKind::FullBand, 1024);
        for len in [100, 1024, 5000] {
            let snap = est.compute(1.8e6, &tone(10.0, 1024, len), &mut avg);
            assert_eq!(snap.bins.len(), 1024);
            assert_eq!(snap.kind, SpectrumKind::FullBand);
        }
    }

    #[test]
    fn test_length_high_quality_mode() {
        let mut est = SpectrumEstimator::new(1024, true);
        assert_eq!(est.working_size(500), 1024);
        assert_eq!(est.working_size(3000), 2048);
        assert_eq!(est.working_size(100_000), 16384);
        let mut avg = SpectrumAverager::new(SpectrumKind::Segment, 1024);
        for len in [500, 3000, 100_000] {
            let snap = est.compute(56_250.0, &tone(10.0, 1024, len), &mut avg);
            assert_eq!(snap.bins.len(), 1024);
        }
    }

    #[test]
    fn test_plan_follows_working_size() {
        let mut est = SpectrumEstimator::new(1024, true);
        assert_eq!(est.planned_size(), None);
        let mut avg = SpectrumAverager::new(SpectrumKind::FullBand, 1024);
        est.compute(1.8e6, &tone(10.0, 1024, 65_536), &mut avg);
        assert_eq!(est.planned_size(), Some(16384));
        est.compute(1.8e6, &tone(10.0, 1024, 3000), &mut avg);
        assert_eq!(est.planned_size(), Some(2048));
    }

    #[test]
    fn test_dc_centered() {
        let mut est = SpectrumEstimator::new(1024, false);
        let mut avg = SpectrumAverager::new(SpectrumKind::Segment, 1024);
        let dc = vec![Complex::new(1.0, 0.0); 1024];
        let snap = est.compute(1024.0, &dc, &mut avg);
        // Smoothing drags the peak by at most a bin
        let p = peak(&snap.bins) as i64;
        assert!((p - 512).abs() <= 1, "peak at {}", p);
    }

    #[test]
    fn test_negative_frequency_below_center() {
        let mut est = SpectrumEstimator::new(1024, false);
        let mut avg = SpectrumAverager::new(SpectrumKind::Segment, 1024);
        let snap = est.compute(1024.0, &tone(-200.0, 1024, 1024), &mut avg);
        let p = peak(&snap.bins) as i64;
        assert!((p - 312).abs() <= 1, "peak at {}", p);

        let mut avg = SpectrumAverager::new(SpectrumKind::Segment, 1024);
        let snap = est.compute(1024.0, &tone(200.0, 1024, 1024), &mut avg);
        let p = peak(&snap.bins) as i64;
        assert!((p - 712).abs() <= 1, "peak at {}", p);
    }

    #[test]
    fn test_non_finite_replaced() {
        let mut est = SpectrumEstimator::new(1024, false);
        let mut avg = SpectrumAverager::new(SpectrumKind::FullBand, 1024);
        let silence = vec![Complex::new(0.0, 0.0); 1024];
        let snap = est.compute(1.8e6, &silence, &mut avg);
        assert!(snap.bins.iter().all(|v| v.is_finite()));
        assert!(snap.bins.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_averaging_converges() {
        let mut est = SpectrumEstimator::new(1024, false);
        let mut avg = SpectrumAverager::new(SpectrumKind::Segment, 1024);
        let input = tone(100.0, 1024, 1024);
        let mut last = est.compute(1024.0, &input, &mut avg);
        for _ in 0..40 {
            last = est.compute(1024.0, &input, &mut avg);
        }
        let p = peak(&last.bins);
        let again = est.compute(1024.0, &input, &mut avg);
        assert_relative_eq!(again.bins[p], last.bins[p], epsilon = 1e-3);
        assert_eq!(avg.last(), again.bins.as_slice());
    }

    #[test]
    fn test_publish_latest_wins() {
        let (publisher, receiver) = SpectrumPublisher::channel();
        for i in 0..3 {
            publisher.publish(SpectrumSnapshot {
                kind: SpectrumKind::Segment,
                sample_rate: i as f64,
                bins: vec![0.0; 4],
            });
        }
        assert_eq!(receiver.try_recv().unwrap().sample_rate, 2.0);
        assert!(receiver.try_recv().is_err());

        // Still fine with the consumer gone
        drop(receiver);
        publisher.publish(SpectrumSnapshot {
            kind: SpectrumKind::Segment,
            sample_rate: 3.0,
            bins: vec![],
        });
    }
}
