use anyhow::Result;
use crossbeam::queue::ArrayQueue;
use std::sync::Arc;
use std::time::Duration;

/// Sample format a sink is initialised with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Bounded FIFO of processed samples between the engine and a sink.
///
/// Cloning shares the same queue. When the queue is full the oldest samples
/// are overwritten, so a stalled sink resumes with the newest audio.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    queue: Arc<ArrayQueue<f32>>,
}

impl SampleBuffer {
    pub fn new(format: StreamFormat, duration: Duration) -> Self {
        let frames = (f64::from(format.sample_rate) * duration.as_secs_f64()) as usize;
        let capacity = (frames * format.channels as usize).max(1);

        Self {
            queue: Arc::new(ArrayQueue::new(capacity)),
        }
    }

    /// Appends `block`, returning how many older samples were discarded.
    pub fn enqueue(&self, block: &[f32]) -> usize {
        let mut dropped = 0;
        for &sample in block {
            if self.queue.force_push(sample).is_some() {
                dropped += 1;
            }
        }
        dropped
    }

    pub fn pop(&self) -> Option<f32> {
        self.queue.pop()
    }

    /// Fills `out` from the queue, padding with silence on underrun.
    /// Returns the number of queued samples written.
    pub fn drain_into(&self, out: &mut [f32]) -> usize {
        let mut written = 0;
        for slot in out.iter_mut() {
            match self.queue.pop() {
                Some(sample) => {
                    *slot = sample;
                    written += 1;
                }
                None => *slot = 0.0,
            }
        }
        written
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn clear(&self) {
        while self.queue.pop().is_some() {}
    }
}

/// A playback device that renders samples from a [`SampleBuffer`].
///
/// Calls arrive in the order `init`, `play`, `stop`, `release`; `stop` and
/// `release` must tolerate being called without a successful `init`/`play`.
pub trait PlaybackSink: Send {
    fn init(&mut self, format: StreamFormat, buffer: SampleBuffer) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    fn stop(&mut self);

    fn release(&mut self);
}

/// Hands out playback sinks when the engine starts.
pub trait SinkProvider: Send + Sync {
    fn acquire(&self) -> Result<Box<dyn PlaybackSink>>;
}

/// Provider for engines that only process offline.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPlayback;

impl SinkProvider for NoPlayback {
    fn acquire(&self) -> Result<Box<dyn PlaybackSink>> {
        anyhow::bail!("no playback device configured")
    }
}
