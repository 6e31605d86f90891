//! Bounded sample buffer shared between the capture thread and the encoder.
//!
//! The capture thread appends mono samples on every device callback; the
//! chunk encoder drains everything accumulated since the previous chunk.
//! If the encoder falls behind, the oldest samples are discarded so memory
//! stays bounded at `capacity` samples.
//!
//! # Example
//!
//! ```rust
//! use interview_coach::capture::SampleBuffer;
//!
//! let mut buf = SampleBuffer::new(4);
//! buf.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]);
//! assert_eq!(buf.drain(), vec![2.0, 3.0, 4.0, 5.0]);
//! assert_eq!(buf.discarded(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Thread-shared handle to a [`SampleBuffer`].
pub type SharedSampleBuffer = Arc<Mutex<SampleBuffer>>;

/// Fixed-capacity FIFO of `f32` samples that overwrites its oldest data.
#[derive(Debug)]
pub struct SampleBuffer {
    samples: VecDeque<f32>,
    capacity: usize,
    /// Samples thrown away because the buffer was full.
    discarded: u64,
}

impl SampleBuffer {
    /// Create a buffer holding at most `capacity` samples.
    ///
    /// A capacity of zero is bumped to one so pushes never panic.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            discarded: 0,
        }
    }

    /// Wrap a new buffer for sharing across threads.
    pub fn shared(capacity: usize) -> SharedSampleBuffer {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    /// Append `data`, dropping the oldest samples on overflow.
    pub fn push_slice(&mut self, data: &[f32]) {
        // Only the newest `capacity` samples of `data` can survive.
        let keep = if data.len() > self.capacity {
            self.discarded += (data.len() - self.capacity) as u64;
            &data[data.len() - self.capacity..]
        } else {
            data
        };

        let overflow = (self.samples.len() + keep.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            self.samples.drain(..overflow);
            self.discarded += overflow as u64;
        }
        self.samples.extend(keep.iter().copied());
    }

    /// Take every stored sample in arrival order.
    pub fn drain(&mut self) -> Vec<f32> {
        self.samples.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total samples discarded due to overflow since creation.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Duration of the buffered audio at `sample_rate` Hz mono.
    pub fn duration_secs(&self, sample_rate: u32) -> f32 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / sample_rate as f32
    }
}

/// Lock a shared buffer, recovering the data if a capture thread panicked
/// while holding the lock.
pub fn lock_buffer(buffer: &SharedSampleBuffer) -> MutexGuard<'_, SampleBuffer> {
    buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
