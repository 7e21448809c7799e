//! This module contains all the capture logic
//!
//! The capture side does one thing: read raw IQ, turn it into sample
//! batches and push them into the queue the DSP loop drains. The queue is
//! unbounded, so the reader never waits on processing.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::control::Tuner;
use crate::error::Result;
use crate::iq::IqFormat;
use crate::processing::StopSignal;
use crate::SampleBatch;

/// Samples per batch read from a file unless told otherwise
pub const DEFAULT_BATCH_SIZE: usize = 65_536;

/// The FIFO between acquisition and the processing loop
pub fn sample_queue() -> (Sender<SampleBatch>, Receiver<SampleBatch>) {
    unbounded()
}

/// Reads a recorded IQ stream and replays it as batches
pub struct FileSource<R> {
    reader: R,
    format: IqFormat,
    batch_size: usize,
    sample_rate: u32,
    paced: bool,
    tuner: Arc<FileTuner>,
}

impl FileSource<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P, format: IqFormat, sample_rate: u32) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        info!("Reading {} samples from {}", format.extension(), path.as_ref().display());
        Ok(Self::from_reader(BufReader::new(file), format, sample_rate))
    }
}

impl<R: Read> FileSource<R> {
    pub fn from_reader(reader: R, format: IqFormat, sample_rate: u32) -> Self {
        Self {
            reader,
            format,
            batch_size: DEFAULT_BATCH_SIZE,
            sample_rate,
            paced: true,
            tuner: Arc::new(FileTuner::new(sample_rate)),
        }
    }

    /// Samples per batch. Zero is bumped to one.
    pub fn batch_size(mut self, samples: usize) -> Self {
        self.batch_size = samples.max(1);
        self
    }

    /// When unpaced, batches go out as fast as they can be read
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    /// The control side of this source
    pub fn tuner(&self) -> Arc<FileTuner> {
        self.tuner.clone()
    }

    /// Fill `buf` as far as the reader allows. Returns the number of bytes read.
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    /// Push batches into `queue` until EOF, a stop request, or the loop going away.
    /// Returns the number of samples sent.
    pub fn run(mut self, queue: Sender<SampleBatch>, stop: StopSignal) -> Result<u64> {
        let mut bytes = vec![0u8; self.batch_size * self.format.sample_size()];
        let start = Instant::now();
        let mut sent = 0u64;
        while !stop.is_stopped() {
            let n = self.fill(&mut bytes)?;
            if n == 0 {
                info!("End of input after {} samples", sent);
                break;
            }
            let mut batch = Vec::with_capacity(n / self.format.sample_size());
            self.format.unpack(&bytes[..n], &mut batch);
            if batch.is_empty() {
                warn!("Dropping {} trailing bytes", n);
                break;
            }
            sent += batch.len() as u64;
            if queue.send(batch).is_err() {
                debug!("Sample queue closed");
                break;
            }
            if self.paced {
                let due = Duration::from_secs_f64(sent as f64 / self.sample_rate as f64);
                if let Some(wait) = due.checked_sub(start.elapsed()) {
                    thread::sleep(wait);
                }
            }
        }
        Ok(sent)
    }
}

/// Tuner for a recorded stream: nothing to retune, so requests are recorded and logged
#[derive(Debug, Default)]
pub struct FileTuner {
    center_frequency: AtomicU32,
    sample_rate: AtomicU32,
    gain: AtomicU32,
}

impl FileTuner {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: AtomicU32::new(sample_rate),
            ..Default::default()
        }
    }

    pub fn center_frequency(&self) -> u32 {
        self.center_frequency.load(Ordering::Relaxed)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    pub fn gain(&self) -> u32 {
        self.gain.load(Ordering::Relaxed)
    }
}

impl Tuner for FileTuner {
    fn set_center_frequency(&self, hz: u32) -> Result<()> {
        debug!("File source: center frequency {} Hz (recorded only)", hz);
        self.center_frequency.store(hz, Ordering::Relaxed);
        Ok(())
    }

    fn set_sample_rate(&self, rate: u32) -> Result<()> {
        debug!("File source: sample rate {} (recorded only)", rate);
        self.sample_rate.store(rate, Ordering::Relaxed);
        Ok(())
    }

    fn set_gain(&self, tenths_db: u32) -> Result<()> {
        debug!("File source: gain {} (recorded only)", tenths_db);
        self.gain.store(tenths_db, Ordering::Relaxed);
        Ok(())
    }
}
