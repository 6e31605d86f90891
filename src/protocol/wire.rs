//! JSON payloads exchanged with the analysis service.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::metrics::Metrics;

/// Client → server text frame carrying one encoded chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioEnvelope {
    /// Base64 (standard alphabet, padded) of the chunk bytes.
    pub audio: String,
}

impl AudioEnvelope {
    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            audio: STANDARD.encode(data),
        }
    }

    /// Serialise to the JSON text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Server → client live update.  Any subset of fields may be present.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LiveUpdate {
    pub transcript: Option<String>,
    /// Fractional counts are rounded; negative or non-numeric ones are
    /// treated as absent.
    #[serde(deserialize_with = "lenient_count")]
    pub fillers: Option<u32>,
    pub wpm: Option<f64>,
    pub confidence: Option<f64>,
}

impl LiveUpdate {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(count_from_json))
}

fn count_from_json(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return Some(n.min(u32::MAX as u64) as u32);
    }
    let n = value.as_f64()?;
    (n.is_finite() && n >= 0.0).then(|| n.round().min(u32::MAX as f64) as u32)
}

impl From<LiveUpdate> for Metrics {
    /// Missing fields fall back to zero values; nothing carries over from a
    /// previous update.
    fn from(update: LiveUpdate) -> Self {
        Metrics {
            transcript: update.transcript.unwrap_or_default(),
            fillers: update.fillers.unwrap_or_default(),
            wpm: update.wpm.unwrap_or_default(),
            confidence: update.confidence.unwrap_or_default(),
        }
    }
}

/// `POST /analyze_video` response.  All four fields are required.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisResponse {
    pub transcript: String,
    pub fillers: u32,
    pub wpm: f64,
    pub confidence: f64,
}

impl From<AnalysisResponse> for Metrics {
    fn from(r: AnalysisResponse) -> Self {
        Metrics {
            transcript: r.transcript,
            fillers: r.fillers,
            wpm: r.wpm,
            confidence: r.confidence,
        }
    }
}

/// `GET /question` response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuestionResponse {
    pub question: String,
}
