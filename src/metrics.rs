//! Speaking metrics reported by the remote analysis service.
//!
//! A [`Metrics`] value is always replaced wholesale — the live preview and the
//! final analysis never merge field-by-field.

use serde::{Deserialize, Serialize};

/// One complete set of metrics for an answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Transcript of the spoken answer.
    pub transcript: String,
    /// Number of filler words detected ("um", "uh", "like", …).
    pub fillers: u32,
    /// Speaking pace in words per minute.
    pub wpm: f64,
    /// Confidence score in `[0, 100]`.
    pub confidence: f64,
}

impl Metrics {
    /// Word count of the transcript, used by the UI summary line.
    pub fn word_count(&self) -> usize {
        self.transcript.split_whitespace().count()
    }
}
