//! Microphone capture for the live-feedback stream.
//!
//! - [`device`]   — cpal-backed [`MediaDevice`] on a dedicated capture thread
//! - [`buffer`]   — bounded sample FIFO shared with the capture callback
//! - [`resample`] — downmix and rate conversion of callback buffers
//! - [`encoder`]  — mono samples to standalone Opus/WebM chunks
//! - [`webm`]     — single-track WebM muxer used by the encoder
//! - [`handle`]   — device ownership and the periodic [`ChunkSource`]

pub mod buffer;
pub mod device;
pub mod encoder;
pub mod handle;
pub mod resample;
pub mod webm;

pub use buffer::{lock_buffer, SampleBuffer, SharedSampleBuffer};
pub use device::CpalDevice;
pub use encoder::{AudioChunk, EncodeError, WebmEncoder, OPUS_RATES};
pub use handle::{ChunkSource, DeviceError, DeviceStream, MediaDevice, MediaStreamHandle};
pub use resample::{downmix, i16_to_f32, resample, u16_to_f32};
