//! Device ownership and the periodic chunk source.
//!
//! [`MediaDevice::acquire`] hands out a [`MediaStreamHandle`] — exclusive
//! ownership of a live input stream.  The handle feeds a shared
//! [`SampleBuffer`](super::SampleBuffer); [`MediaStreamHandle::begin_encoding`]
//! attaches a [`ChunkSource`] that turns whatever has accumulated into an
//! [`AudioChunk`] every interval.
//!
//! Releasing the handle stops the device.  Release is idempotent and also
//! runs on `Drop`, so every exit path gives the device back.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::buffer::{lock_buffer, SharedSampleBuffer};
use super::encoder::{AudioChunk, WebmEncoder};

// ---------------------------------------------------------------------------
// DeviceError
// ---------------------------------------------------------------------------

/// Why the microphone could not be acquired.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("no audio input device is available")]
    NoDevice,

    #[error("audio input device \"{0}\" was not found")]
    NotFound(String),

    #[error("microphone unavailable or access denied: {0}")]
    Unavailable(String),

    #[error("unsupported input sample format: {0}")]
    UnsupportedFormat(String),

    #[error("capture thread failed: {0}")]
    Thread(String),
}

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// A running device stream that can be stopped.
///
/// `stop` is called at most once by [`MediaStreamHandle`].
pub trait DeviceStream: Send {
    fn stop(&mut self);
}

/// Source of live input streams (microphone).
#[async_trait]
pub trait MediaDevice: Send + Sync {
    /// Open the input device and start capturing into a fresh buffer.
    async fn acquire(&self) -> Result<MediaStreamHandle, DeviceError>;
}

// ---------------------------------------------------------------------------
// MediaStreamHandle
// ---------------------------------------------------------------------------

/// Exclusive ownership of one live capture stream.
pub struct MediaStreamHandle {
    stream: Option<Box<dyn DeviceStream>>,
    buffer: SharedSampleBuffer,
    sample_rate: u32,
}

impl MediaStreamHandle {
    /// Wrap a started `stream` that pushes mono samples at `sample_rate`
    /// into `buffer`.
    pub fn new(stream: Box<dyn DeviceStream>, buffer: SharedSampleBuffer, sample_rate: u32) -> Self {
        Self {
            stream: Some(stream),
            buffer,
            sample_rate,
        }
    }

    /// Attach an encoder that emits one chunk per `interval`.
    pub fn begin_encoding(&self, interval: Duration) -> ChunkSource {
        ChunkSource::new(self.buffer.clone(), WebmEncoder::new(self.sample_rate), interval)
    }

    /// Stop the device.  Calling this again is a no-op.
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            log::info!("capture: input device released");
        }
    }

    pub fn is_released(&self) -> bool {
        self.stream.is_none()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for MediaStreamHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for MediaStreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStreamHandle")
            .field("sample_rate", &self.sample_rate)
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ChunkSource
// ---------------------------------------------------------------------------

/// Endless stream of encoded chunks, one per interval.
///
/// Intervals in which nothing was captured are skipped rather than emitting
/// an empty chunk.  [`flush`](Self::flush) encodes whatever is pending right
/// away.
pub struct ChunkSource {
    buffer: SharedSampleBuffer,
    encoder: WebmEncoder,
    ticker: Interval,
}

impl ChunkSource {
    fn new(buffer: SharedSampleBuffer, encoder: WebmEncoder, interval: Duration) -> Self {
        let period = interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            buffer,
            encoder,
            ticker,
        }
    }

    /// Wait for the next interval boundary that has audio to encode.
    ///
    /// Cancel-safe: dropping the future loses no samples.
    pub async fn next_chunk(&mut self) -> AudioChunk {
        loop {
            self.ticker.tick().await;
            if let Some(chunk) = self.flush() {
                return chunk;
            }
        }
    }

    /// Encode everything captured since the previous chunk, if anything.
    pub fn flush(&mut self) -> Option<AudioChunk> {
        let samples = lock_buffer(&self.buffer).drain();
        if samples.is_empty() {
            return None;
        }

        match self.encoder.encode(&samples) {
            Ok(chunk) => Some(chunk),
            Err(e) => {
                log::warn!("capture: dropping {} samples, {e}", samples.len());
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
