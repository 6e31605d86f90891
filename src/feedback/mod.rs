//! Rule-based coaching feedback.
//!
//! [`generate_suggestions`] maps a finished [`Metrics`](crate::metrics::Metrics)
//! value to an ordered list of [`Suggestion`]s:
//!
//! ```text
//! pace  →  filler words  →  confidence  →  general tip
//! ```
//!
//! Each dimension is evaluated on its own; the results are concatenated in
//! that fixed order.  The engine is pure — calling it twice with the same
//! input yields the same output.
//!
//! # Example
//!
//! ```rust
//! use interview_coach::feedback::{generate_suggestions, Severity};
//! use interview_coach::metrics::Metrics;
//!
//! let metrics = Metrics { transcript: "hi".into(), fillers: 2, wpm: 140.0, confidence: 85.0 };
//! let tips = generate_suggestions(&metrics);
//!
//! assert_eq!(tips.len(), 4);
//! assert_eq!(tips[0].title, "Perfect Pace");
//! assert_eq!(tips[0].severity, Severity::Success);
//! ```

pub mod rules;

pub use rules::{generate_suggestions, rate_confidence, rate_pace};

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// How a suggestion should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Success,
}

impl Severity {
    /// Short label for plain-text rendering.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Success => "success",
        }
    }
}

// ---------------------------------------------------------------------------
// Suggestion
// ---------------------------------------------------------------------------

/// A single coaching message.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub title: &'static str,
    pub message: &'static str,
    pub severity: Severity,
}

// ---------------------------------------------------------------------------
// Rating
// ---------------------------------------------------------------------------

/// Coarse grade of a single metric, used to colour values in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Good,
    Fair,
    Poor,
}
