//! Real-time beacon drift compensation for a wideband IQ stream.
//!
//! Batches of complex samples arrive on a queue, a single processing thread
//! locks a Costas loop onto a known narrow-band beacon at a decimated rate,
//! and the loop's phase track is applied back to the full-rate samples
//! before they are handed to the sink.

use num_complex::Complex;

pub mod args;
pub mod buffers;
pub mod capture;
pub mod config;
pub mod control;
pub mod dsp;
pub mod error;
pub mod exfil;
pub mod iq;
pub mod monitoring;
pub mod pipeline;
pub mod processing;
pub mod spectrum;

pub use error::{Error, Result};

/// One complex baseband sample
pub type Sample = Complex<f32>;

/// A contiguous run of samples at the source rate
pub type SampleBatch = Vec<Sample>;
