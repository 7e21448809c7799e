//! In this module we keep the runtime stats of the drift compensator.
//! Every field is a single atomic word so the processing thread can update
//! them without locks and any other thread can read a (possibly stale)
//! value at any time.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

#[derive(Debug, Default)]
pub struct Telemetry {
    /// f64 bits, Hz
    lock_offset: AtomicU64,
    /// f64 bits, Hz
    segment_center_frequency: AtomicU64,
    /// f64 bits, Hz
    segment_sample_rate: AtomicU64,
    /// f64 bits, Hz
    server_center_frequency: AtomicU64,
    batches: AtomicU64,
    samples: AtomicU64,
    skipped: AtomicU64,
    spectra: AtomicU64,
}

fn load_f64(cell: &AtomicU64) -> f64 {
    f64::from_bits(cell.load(Ordering::Relaxed))
}

fn store_f64(cell: &AtomicU64, v: f64) {
    cell.store(v.to_bits(), Ordering::Relaxed);
}

impl Telemetry {
    /// Residual beacon offset seen by the tracking loop
    pub fn lock_offset(&self) -> f64 {
        load_f64(&self.lock_offset)
    }

    /// Where the beacon actually sits: absolute frequency plus drift
    pub fn segment_center_frequency(&self) -> f64 {
        load_f64(&self.segment_center_frequency)
    }

    pub fn segment_sample_rate(&self) -> f64 {
        load_f64(&self.segment_sample_rate)
    }

    pub fn server_center_frequency(&self) -> f64 {
        load_f64(&self.server_center_frequency)
    }

    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn spectra(&self) -> u64 {
        self.spectra.load(Ordering::Relaxed)
    }

    pub fn set_segment_sample_rate(&self, hz: f64) {
        store_f64(&self.segment_sample_rate, hz);
    }

    pub fn set_segment_center_frequency(&self, hz: f64) {
        store_f64(&self.segment_center_frequency, hz);
    }

    pub fn set_server_center_frequency(&self, hz: f64) {
        store_f64(&self.server_center_frequency, hz);
    }

    pub fn report_lock(&self, offset_hz: f64, beacon_absolute: f64) {
        store_f64(&self.lock_offset, offset_hz);
        store_f64(&self.segment_center_frequency, beacon_absolute + offset_hz);
        debug!("Offset: {:.2} Hz", offset_hz);
    }

    pub fn count_batch(&self, len: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.samples.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub fn count_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count_spectra(&self) {
        self.spectra.fetch_add(1, Ordering::Relaxed);
    }
}
