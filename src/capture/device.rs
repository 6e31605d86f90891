//! Microphone capture via `cpal`.
//!
//! `cpal::Stream` is not `Send`, so [`CpalDevice`] builds and owns it on a
//! dedicated `audio-capture` OS thread.  The thread reports start-up success
//! or failure over a oneshot, then parks until the handle is released, at
//! which point it drops the stream and exits.
//!
//! Each device callback is downmixed to mono, resampled to the configured
//! rate and appended to the handle's [`SampleBuffer`](super::SampleBuffer).

use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::oneshot;

use crate::config::CaptureConfig;

use super::buffer::{lock_buffer, SampleBuffer, SharedSampleBuffer};
use super::handle::{DeviceError, DeviceStream, MediaDevice, MediaStreamHandle};
use super::resample::{downmix, i16_to_f32, resample, u16_to_f32};

impl From<cpal::DevicesError> for DeviceError {
    fn from(e: cpal::DevicesError) -> Self {
        DeviceError::Unavailable(e.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for DeviceError {
    fn from(e: cpal::DefaultStreamConfigError) -> Self {
        DeviceError::Unavailable(e.to_string())
    }
}

impl From<cpal::BuildStreamError> for DeviceError {
    fn from(e: cpal::BuildStreamError) -> Self {
        DeviceError::Unavailable(e.to_string())
    }
}

impl From<cpal::PlayStreamError> for DeviceError {
    fn from(e: cpal::PlayStreamError) -> Self {
        DeviceError::Unavailable(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// CpalDevice
// ---------------------------------------------------------------------------

/// Production [`MediaDevice`] backed by the default cpal host.
#[derive(Debug, Clone)]
pub struct CpalDevice {
    /// Input device name; `None` selects the system default.
    device_name: Option<String>,
    /// Rate samples are converted to before buffering.
    target_rate: u32,
    /// Buffer capacity in samples.
    buffer_samples: usize,
}

impl CpalDevice {
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            device_name: config.input_device.clone(),
            target_rate: config.encode_rate(),
            buffer_samples: (config.encode_rate() as f32 * config.buffer_secs.max(1.0)) as usize,
        }
    }
}

#[async_trait]
impl MediaDevice for CpalDevice {
    async fn acquire(&self) -> Result<MediaStreamHandle, DeviceError> {
        let buffer = SampleBuffer::shared(self.buffer_samples);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), DeviceError>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let sink = CaptureSink {
            buffer: buffer.clone(),
            target_rate: self.target_rate,
        };
        let device_name = self.device_name.clone();

        let thread = std::thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || {
                let stream = match open_input_stream(device_name.as_deref(), sink) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Park until released (or the handle is gone).
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| DeviceError::Thread(e.to_string()))?;

        match ready_rx.await {
            Ok(Ok(())) => {
                log::info!("capture: input device acquired ({} Hz mono)", self.target_rate);
                let stream = CaptureThread {
                    stop_tx: Some(stop_tx),
                    thread: Some(thread),
                };
                Ok(MediaStreamHandle::new(Box::new(stream), buffer, self.target_rate))
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(DeviceError::Thread(
                "capture thread exited during start-up".into(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureThread
// ---------------------------------------------------------------------------

/// Owner side of the `audio-capture` thread.
struct CaptureThread {
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl DeviceStream for CaptureThread {
    fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("capture: audio-capture thread panicked");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Stream construction
// ---------------------------------------------------------------------------

/// Converts raw callback buffers and appends them to the shared buffer.
#[derive(Clone)]
struct CaptureSink {
    buffer: SharedSampleBuffer,
    target_rate: u32,
}

impl CaptureSink {
    fn push(&self, interleaved: &[f32], channels: u16, source_rate: u32) {
        let mono = downmix(interleaved, channels);
        let converted = resample(&mono, source_rate, self.target_rate);
        lock_buffer(&self.buffer).push_slice(&converted);
    }
}

fn open_input_stream(
    device_name: Option<&str>,
    sink: CaptureSink,
) -> Result<cpal::Stream, DeviceError> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| DeviceError::NotFound(name.to_string()))?,
        None => host.default_input_device().ok_or(DeviceError::NoDevice)?,
    };

    let supported = device.default_input_config()?;
    let channels = supported.channels();
    let source_rate = supported.sample_rate().0;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    let on_error = |err: cpal::StreamError| {
        log::error!("capture: cpal stream error: {err}");
    };

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                sink.push(data, channels, source_rate);
            },
            on_error,
            None,
        )?,
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let samples: Vec<f32> = data.iter().map(|&s| i16_to_f32(s)).collect();
                sink.push(&samples, channels, source_rate);
            },
            on_error,
            None,
        )?,
        cpal::SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                let samples: Vec<f32> = data.iter().map(|&s| u16_to_f32(s)).collect();
                sink.push(&samples, channels, source_rate);
            },
            on_error,
            None,
        )?,
        other => return Err(DeviceError::UnsupportedFormat(format!("{other:?}"))),
    };

    stream.play()?;
    log::debug!(
        "capture: stream open ({source_rate} Hz, {channels} ch, {sample_format:?})"
    );
    Ok(stream)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
