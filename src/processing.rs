//! The processing loop: one dedicated thread pulling batches off the sample
//! queue and pushing them through the [`Pipeline`].
//!
//! The loop is the only writer of pipeline state. Everything it shares with
//! the outside goes through channels (corrected samples, spectra) or atomics
//! (stop flag, run state, telemetry).

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, trace, warn};

use crate::config::PipelineConfig;
use crate::control::Reconfigurator;
use crate::error::{Error, Result};
use crate::monitoring::Telemetry;
use crate::pipeline::Pipeline;
use crate::spectrum::{
    SpectrumAverager, SpectrumEstimator, SpectrumKind, SpectrumPublisher, SpectrumSnapshot,
};
use crate::SampleBatch;

/// How often the lock offset is pushed to telemetry
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Idle = 0,
    Running = 1,
    Stopped = 2,
}

impl From<u8> for RunState {
    fn from(v: u8) -> Self {
        match v {
            0 => RunState::Idle,
            1 => RunState::Running,
            _ => RunState::Stopped,
        }
    }
}

/// Level-triggered stop request, shared with whoever may end the loop
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Receiving ends of both spectrum streams
pub struct SpectrumStreams {
    pub segment: Receiver<SpectrumSnapshot>,
    pub full_band: Receiver<SpectrumSnapshot>,
}

pub struct ProcessingLoop {
    pipeline: Pipeline,
    queue: Receiver<SampleBatch>,
    sink: Sender<SampleBatch>,
    sink_open: bool,
    segment_estimator: SpectrumEstimator,
    full_estimator: SpectrumEstimator,
    segment_average: SpectrumAverager,
    full_average: SpectrumAverager,
    segment_publisher: SpectrumPublisher,
    full_publisher: SpectrumPublisher,
    spectrum_interval: Duration,
    last_spectrum: Instant,
    last_report: Instant,
    poll_interval: Duration,
    beacon_absolute: f64,
    stop: StopSignal,
    state: Arc<AtomicU8>,
    telemetry: Arc<Telemetry>,
}

impl ProcessingLoop {
    /// Build the loop. Fails on an invalid configuration, before any thread starts.
    pub fn new(
        config: &PipelineConfig,
        reconfigurator: &Reconfigurator,
        queue: Receiver<SampleBatch>,
        sink: Sender<SampleBatch>,
        telemetry: Arc<Telemetry>,
    ) -> Result<(Self, SpectrumStreams)> {
        let pipeline = Pipeline::new(config, reconfigurator.mixing_frequency())?;
        telemetry.set_segment_sample_rate(pipeline.segment_sample_rate());

        let size = config.spectrum.size;
        let (segment_publisher, segment) = SpectrumPublisher::channel();
        let (full_publisher, full_band) = SpectrumPublisher::channel();
        let now = Instant::now();

        let processing = Self {
            pipeline,
            queue,
            sink,
            sink_open: true,
            segment_estimator: SpectrumEstimator::new(size, config.spectrum.high_quality),
            full_estimator: SpectrumEstimator::new(size, config.spectrum.high_quality),
            segment_average: SpectrumAverager::new(SpectrumKind::Segment, size),
            full_average: SpectrumAverager::new(SpectrumKind::FullBand, size),
            segment_publisher,
            full_publisher,
            spectrum_interval: Duration::from_secs(1) / config.spectrum.fps,
            last_spectrum: now,
            last_report: now,
            poll_interval: config.poll_interval,
            beacon_absolute: reconfigurator.beacon_absolute_frequency(),
            stop: StopSignal::new(),
            state: Arc::new(AtomicU8::new(RunState::Idle as u8)),
            telemetry,
        };
        Ok((processing, SpectrumStreams { segment, full_band }))
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn state(&self) -> RunState {
        self.state.load(Ordering::Acquire).into()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    fn set_state(&self, state: RunState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Run on the current thread until stopped or the queue's senders are all gone
    pub fn run(&mut self) {
        self.set_state(RunState::Running);
        info!("Starting DSP loop");
        while !self.stop.is_stopped() {
            match self.queue.recv_timeout(self.poll_interval) {
                Ok(batch) => self.process(batch),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Sample source closed");
                    break;
                }
            }
        }
        self.set_state(RunState::Stopped);
        info!(
            "DSP loop stopped after {} batches ({} samples)",
            self.telemetry.batches(),
            self.telemetry.samples()
        );
    }

    /// Move the loop onto its own thread
    pub fn spawn(mut self) -> Result<LoopHandle> {
        let stop = self.stop.clone();
        let state = self.state.clone();
        let join = thread::Builder::new()
            .name("dsp".to_owned())
            .spawn(move || {
                self.run();
                self
            })?;
        Ok(LoopHandle { stop, state, join })
    }

    /// One batch through every stage, then out to the sink
    fn process(&mut self, mut batch: SampleBatch) {
        if !self.pipeline.process(&mut batch) {
            trace!("Skipping batch of {} samples", batch.len());
            self.telemetry.count_skipped();
            return;
        }
        self.telemetry.count_batch(batch.len());

        if self.last_report.elapsed() >= REPORT_INTERVAL {
            self.telemetry
                .report_lock(self.pipeline.lock_offset_hz(), self.beacon_absolute);
            self.last_report = Instant::now();
        }

        if self.last_spectrum.elapsed() >= self.spectrum_interval {
            self.emit_spectra(&batch);
            self.last_spectrum = Instant::now();
        }

        if self.sink_open && self.sink.send(batch).is_err() {
            warn!("Sample sink disconnected, corrected samples are being dropped");
            self.sink_open = false;
        }
    }

    fn emit_spectra(&mut self, full: &[crate::Sample]) {
        let segment = self.segment_estimator.compute(
            self.pipeline.segment_sample_rate(),
            self.pipeline.segment(),
            &mut self.segment_average,
        );
        let full = self.full_estimator.compute(
            self.pipeline.sample_rate(),
            full,
            &mut self.full_average,
        );
        self.segment_publisher.publish(segment);
        self.full_publisher.publish(full);
        self.telemetry.count_spectra();
        trace!("Published spectra");
    }
}

/// Handle to a loop running on its own thread
pub struct LoopHandle {
    stop: StopSignal,
    state: Arc<AtomicU8>,
    join: JoinHandle<ProcessingLoop>,
}

impl LoopHandle {
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn state(&self) -> RunState {
        self.state.load(Ordering::Acquire).into()
    }

    /// Ask the loop to stop at its next safe point
    pub fn stop(&self) {
        debug!("Stop requested");
        self.stop.stop();
    }

    /// Wait for the loop to exit and get it back
    pub fn join(self) -> Result<ProcessingLoop> {
        self.join.join().map_err(|_| Error::ThreadPanicked("dsp"))
    }
}
