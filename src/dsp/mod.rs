//! The fixed chain of DSP stages.
//!
//! Decimated path: [`DcBlocker`] -> [`FrequencyTranslator`] -> [`Agc`] -> [`CostasLoop`].
//! Full-rate path: [`RateInterpolator`] -> [`PhaseCorrector`].

pub mod agc;
pub mod corrector;
pub mod costas;
pub mod dc_blocker;
pub mod filter;
pub mod interpolator;
pub mod translator;

pub use agc::Agc;
pub use corrector::PhaseCorrector;
pub use costas::{CostasLoop, LoopFrequency};
pub use dc_blocker::DcBlocker;
pub use interpolator::RateInterpolator;
pub use translator::{FrequencyTranslator, MixingFrequency};

use crate::Sample;

/// A stage of the decimated path.
///
/// The stage reads `input` and replaces the contents of `output`; the two
/// never alias, so a stage is free to change the length.
pub trait SampleStage {
    fn process(&mut self, input: &[Sample], output: &mut Vec<Sample>);
}
