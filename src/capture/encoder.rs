//! Chunk encoding: mono `f32` samples → self-contained Opus/WebM blob.
//!
//! Every [`AudioChunk`] is a complete WebM file with its own header and a
//! fresh Opus encoder, so the service can decode each one on its own
//! (`audio/webm`, the same container a browser `MediaRecorder` produces).

use std::time::Duration;

use audiopus::{coder::Encoder, Application, Channels, SampleRate as OpusSampleRate};
use thiserror::Error;

use super::webm::{mux_opus, OpusTrack};

/// Input rates the Opus encoder accepts.
pub const OPUS_RATES: [u32; 5] = [8_000, 12_000, 16_000, 24_000, 48_000];

const FRAME_MS: u64 = 20;
/// Encoder lookahead for the VoIP application, in 48 kHz samples.
const PRE_SKIP: u16 = 312;
const MAX_PACKET: usize = 4_000;

/// One encoded unit of audio ready to hand to the transport.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Encoded bytes (WebM container, Opus track).
    pub data: Vec<u8>,
    /// Number of mono samples the chunk carries.
    pub samples: usize,
    /// Sample rate the chunk was encoded at.
    pub sample_rate: u32,
}

impl AudioChunk {
    /// Playback length of the chunk.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples as f64 / self.sample_rate as f64)
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Opus cannot encode {0} Hz audio")]
    UnsupportedRate(u32),

    #[error("Opus encoding failed: {0}")]
    Opus(#[from] audiopus::Error),
}

/// Encodes mono sample runs as 20 ms Opus frames in a WebM container.
#[derive(Debug, Clone, Copy)]
pub struct WebmEncoder {
    sample_rate: u32,
}

impl WebmEncoder {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Encode `samples` into a standalone WebM chunk.
    ///
    /// Samples outside `[-1.0, 1.0]` are clipped; the last frame is padded
    /// with silence.
    pub fn encode(&self, samples: &[f32]) -> Result<AudioChunk, EncodeError> {
        let rate = opus_rate(self.sample_rate)?;
        let encoder = Encoder::new(rate, Channels::Mono, Application::Voip)?;

        let frame_len = (self.sample_rate as u64 * FRAME_MS / 1_000) as usize;
        let mut packets = Vec::with_capacity(samples.len() / frame_len + 1);
        let mut frame = vec![0i16; frame_len];
        let mut packet = [0u8; MAX_PACKET];

        for run in samples.chunks(frame_len) {
            frame.fill(0);
            for (slot, &sample) in frame.iter_mut().zip(run) {
                *slot = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            }
            let len = encoder.encode(&frame, &mut packet)?;
            packets.push(packet[..len].to_vec());
        }

        let track = OpusTrack {
            channels: 1,
            input_rate: self.sample_rate,
            pre_skip: PRE_SKIP,
        };
        Ok(AudioChunk {
            data: mux_opus(&track, &packets, FRAME_MS),
            samples: samples.len(),
            sample_rate: self.sample_rate,
        })
    }
}

fn opus_rate(hz: u32) -> Result<OpusSampleRate, EncodeError> {
    Ok(match hz {
        8_000 => OpusSampleRate::Hz8000,
        12_000 => OpusSampleRate::Hz12000,
        16_000 => OpusSampleRate::Hz16000,
        24_000 => OpusSampleRate::Hz24000,
        48_000 => OpusSampleRate::Hz48000,
        other => return Err(EncodeError::UnsupportedRate(other)),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
