//! Application settings structs, defaults and TOML persistence.
//!
//! Every section carries `#[serde(default)]`, so a hand-edited file that
//! names only a few keys still loads with the rest filled from defaults.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::capture::OPUS_RATES;

// ---------------------------------------------------------------------------
// ServiceConfig
// ---------------------------------------------------------------------------

/// Where the analysis service lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL for `GET /question` and `POST /analyze_video`.
    pub base_url: String,
    /// WebSocket endpoint for live chunk streaming.
    pub stream_url: String,
    /// Upper bound for one HTTP request, upload included.
    pub request_timeout_secs: u64,
    /// Upper bound for the WebSocket handshake.
    pub connect_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            stream_url: "ws://localhost:8000/ws".into(),
            request_timeout_secs: 120,
            connect_timeout_secs: 10,
        }
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}

// ---------------------------------------------------------------------------
// CaptureConfig
// ---------------------------------------------------------------------------

/// Microphone capture and chunking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Wall-clock length of one streamed chunk in milliseconds.
    pub chunk_interval_ms: u64,
    /// Rate captured audio is converted to before encoding.
    pub sample_rate: u32,
    /// Audio input device name; `None` means the system default.
    pub input_device: Option<String>,
    /// Seconds of audio held before the oldest samples are discarded.
    pub buffer_secs: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            chunk_interval_ms: 2_000,
            sample_rate: 16_000,
            input_device: None,
            buffer_secs: 30.0,
        }
    }
}

impl CaptureConfig {
    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms.max(1))
    }

    /// `sample_rate` if Opus can encode it, otherwise 16 kHz.
    pub fn encode_rate(&self) -> u32 {
        if OPUS_RATES.contains(&self.sample_rate) {
            self.sample_rate
        } else {
            log::warn!(
                "config: {} Hz is not an Opus rate, capturing at 16000 Hz",
                self.sample_rate
            );
            16_000
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// egui window settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Keep the window floating above all other windows.
    pub always_on_top: bool,
    /// Initial inner window size `(width, height)` in logical pixels.
    pub window_size: (f32, f32),
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            always_on_top: false,
            window_size: (460.0, 620.0),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use interview_coach::config::AppConfig;
///
/// // Defaults when the file is missing
/// let config = AppConfig::load().unwrap();
/// println!("analysis service at {}", config.service.base_url);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub capture: CaptureConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save to the platform `settings.toml`, creating parent directories.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
