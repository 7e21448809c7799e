//! Live reconfiguration of a running pipeline.
//!
//! The processing thread never sees a [`Controller`]; it only reads the
//! [`MixingFrequency`] cell the controller publishes into. The tuning record
//! itself (center frequency and beacon offset) sits behind one mutex so a
//! frequency change and the offset derived from it are always updated
//! together.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::dsp::MixingFrequency;
use crate::error::{Error, Result};
use crate::monitoring::Telemetry;

/// The radio side of the control contract
pub trait Tuner: Send + Sync {
    fn set_center_frequency(&self, hz: u32) -> Result<()>;
    fn set_sample_rate(&self, rate: u32) -> Result<()>;
    fn set_gain(&self, tenths_db: u32) -> Result<()>;
}

/// Current tuning of the pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuning {
    pub center_frequency: u32,
    pub beacon_offset: f64,
}

struct Shared {
    tuning: Mutex<Tuning>,
    /// Center frequency plus beacon offset at startup
    beacon_absolute: f64,
    mixing: MixingFrequency,
    telemetry: Arc<Telemetry>,
}

/// Applies center frequency and beacon offset changes while the loop runs
#[derive(Clone)]
pub struct Reconfigurator {
    shared: Arc<Shared>,
}

impl Reconfigurator {
    pub fn new(config: &PipelineConfig, telemetry: Arc<Telemetry>) -> Self {
        let tuning = Tuning {
            center_frequency: config.source.center_frequency,
            beacon_offset: config.processing.beacon_offset,
        };
        let beacon_absolute = config.beacon_absolute_frequency();
        info!("Beacon absolute frequency: {} Hz", beacon_absolute);
        telemetry.set_server_center_frequency(tuning.center_frequency as f64);
        telemetry.set_segment_center_frequency(beacon_absolute);
        Self {
            shared: Arc::new(Shared {
                tuning: Mutex::new(tuning),
                beacon_absolute,
                mixing: MixingFrequency::new(-tuning.beacon_offset),
                telemetry,
            }),
        }
    }

    /// Cell the translator must read its mixing frequency from
    pub fn mixing_frequency(&self) -> MixingFrequency {
        self.shared.mixing.clone()
    }

    pub fn beacon_absolute_frequency(&self) -> f64 {
        self.shared.beacon_absolute
    }

    pub fn tuning(&self) -> Tuning {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, Tuning> {
        self.shared
            .tuning
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The radio moved: keep the beacon where it is in absolute terms
    pub fn on_change_center_frequency(&self, hz: u32) {
        let mut tuning = self.lock();
        info!(
            "Changed center frequency from {} Hz to {} Hz. Recalculating.",
            tuning.center_frequency, hz
        );
        tuning.beacon_offset = self.shared.beacon_absolute - hz as f64;
        tuning.center_frequency = hz;
        self.refresh(&tuning);
    }

    pub fn on_change_beacon_offset(&self, offset: f64) {
        let mut tuning = self.lock();
        info!("Setting beacon offset to {} Hz", offset);
        tuning.beacon_offset = offset;
        self.refresh(&tuning);
    }

    fn refresh(&self, tuning: &Tuning) {
        self.shared.mixing.set(-tuning.beacon_offset);
        debug!("New beacon offset: {} Hz", tuning.beacon_offset);
        self.shared
            .telemetry
            .set_server_center_frequency(tuning.center_frequency as f64);
    }
}

/// Control surface handed to whatever drives the radio remotely
#[derive(Clone)]
pub struct Controller {
    reconfigurator: Reconfigurator,
    tuner: Arc<dyn Tuner>,
    sample_rate: u32,
}

impl Controller {
    pub fn new(reconfigurator: Reconfigurator, tuner: Arc<dyn Tuner>, sample_rate: u32) -> Self {
        Self {
            reconfigurator,
            tuner,
            sample_rate,
        }
    }

    pub fn reconfigurator(&self) -> &Reconfigurator {
        &self.reconfigurator
    }

    /// Retune the radio, then follow with the translator
    pub fn set_center_frequency(&self, hz: u32) -> Result<()> {
        info!("Setting center frequency to {}", hz);
        self.tuner.set_center_frequency(hz)?;
        self.reconfigurator.on_change_center_frequency(hz);
        Ok(())
    }

    pub fn set_beacon_offset(&self, offset: f64) -> Result<()> {
        self.reconfigurator.on_change_beacon_offset(offset);
        Ok(())
    }

    pub fn set_gain(&self, tenths_db: u32) -> Result<()> {
        info!("Setting gain to {}", tenths_db);
        self.tuner.set_gain(tenths_db)
    }

    /// Only the rate the pipeline was built for is accepted
    pub fn set_sample_rate(&self, rate: u32) -> Result<()> {
        if rate != self.sample_rate {
            return Err(Error::SampleRateMismatch {
                requested: rate,
                configured: self.sample_rate,
            });
        }
        info!("Setting sample rate to {}", rate);
        self.tuner.set_sample_rate(rate)
    }
}
