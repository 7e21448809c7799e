//! Ping-pong storage for the decimated path.
//!
//! Two buffers alternate between "current" (the last stage's output) and
//! "spare" (where the next stage writes). Capacity only ever grows, so once
//! the largest batch has been seen no stage allocates again.

use crate::dsp::SampleStage;
use crate::Sample;

#[derive(Debug, Default)]
pub struct ScratchBuffers {
    buffers: [Vec<Sample>; 2],
    active: usize,
}

impl ScratchBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy a fresh batch into the current buffer, growing both buffers if needed
    pub fn load(&mut self, input: &[Sample]) {
        for buf in self.buffers.iter_mut() {
            if buf.capacity() < input.len() {
                buf.reserve(input.len() - buf.len());
            }
        }
        let current = &mut self.buffers[self.active];
        current.clear();
        current.extend_from_slice(input);
    }

    /// Run `stage` from the current buffer into the spare one and make that current
    pub fn apply<S: SampleStage + ?Sized>(&mut self, stage: &mut S) {
        let (head, tail) = self.buffers.split_at_mut(1);
        let (input, output) = if self.active == 0 {
            (&head[0], &mut tail[0])
        } else {
            (&tail[0], &mut head[0])
        };
        stage.process(input, output);
        self.active ^= 1;
    }

    /// Output of the last stage
    pub fn current(&self) -> &[Sample] {
        &self.buffers[self.active]
    }

    /// Smallest capacity of the two buffers
    pub fn capacity(&self) -> usize {
        self.buffers[0].capacity().min(self.buffers[1].capacity())
    }
}
