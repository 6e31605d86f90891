//! The rule table behind [`generate_suggestions`].
//!
//! | Dimension  | Band                | Severity | Title                  |
//! |------------|---------------------|----------|------------------------|
//! | Pace       | `wpm < 100`         | Warning  | Speak Faster           |
//! | Pace       | `100 ≤ wpm < 130`   | Info     | Slightly Faster        |
//! | Pace       | `130 ≤ wpm ≤ 170`   | Success  | Perfect Pace           |
//! | Pace       | `170 < wpm ≤ 200`   | Info     | Slightly Slower        |
//! | Pace       | `wpm > 200`         | Warning  | Slow Down              |
//! | Fillers    | `fillers > 10`      | Warning  | Too Many Filler Words  |
//! | Fillers    | `5 < fillers ≤ 10`  | Info     | Reduce Filler Words    |
//! | Fillers    | `fillers ≤ 3`       | Success  | Great Clarity          |
//! | Confidence | `c < 60`            | Warning  | Build Confidence       |
//! | Confidence | `60 ≤ c < 80`       | Info     | Almost There           |
//! | Confidence | `c ≥ 80`            | Success  | Highly Confident       |
//!
//! Filler counts of 4 and 5 fall between the bands and produce no filler
//! suggestion at all.

use crate::metrics::Metrics;

use super::{Rating, Severity, Suggestion};

const SPEAK_FASTER: Suggestion = Suggestion {
    title: "Speak Faster",
    message: "You're speaking too slowly. Aim for 130-170 words per minute for a natural, confident pace.",
    severity: Severity::Warning,
};

const SLOW_DOWN: Suggestion = Suggestion {
    title: "Slow Down",
    message: "You're speaking too fast! Take a breath and slow down to 130-170 words per minute for better clarity.",
    severity: Severity::Warning,
};

const SLIGHTLY_FASTER: Suggestion = Suggestion {
    title: "Slightly Faster",
    message: "Good pace, but try speaking a bit faster to sound more energetic and confident.",
    severity: Severity::Info,
};

const SLIGHTLY_SLOWER: Suggestion = Suggestion {
    title: "Slightly Slower",
    message: "Good energy, but consider slowing down just a bit for better comprehension.",
    severity: Severity::Info,
};

const PERFECT_PACE: Suggestion = Suggestion {
    title: "Perfect Pace",
    message: "Excellent speaking pace! You're in the ideal range of 130-170 words per minute.",
    severity: Severity::Success,
};

const TOO_MANY_FILLERS: Suggestion = Suggestion {
    title: "Too Many Filler Words",
    message: "You used a lot of filler words (um, uh, like). Practice pausing instead of filling silence. It shows confidence!",
    severity: Severity::Warning,
};

const REDUCE_FILLERS: Suggestion = Suggestion {
    title: "Reduce Filler Words",
    message: "Try to minimize filler words. Take brief pauses to gather your thoughts instead.",
    severity: Severity::Info,
};

const GREAT_CLARITY: Suggestion = Suggestion {
    title: "Great Clarity",
    message: "Excellent! You kept filler words to a minimum, showing strong communication skills.",
    severity: Severity::Success,
};

const BUILD_CONFIDENCE: Suggestion = Suggestion {
    title: "Build Confidence",
    message: "Practice makes perfect! Maintain eye contact with the camera, speak clearly, and believe in your answers.",
    severity: Severity::Warning,
};

const ALMOST_THERE: Suggestion = Suggestion {
    title: "Almost There",
    message: "Good confidence level! Focus on maintaining steady eye contact and projecting your voice.",
    severity: Severity::Info,
};

const HIGHLY_CONFIDENT: Suggestion = Suggestion {
    title: "Highly Confident",
    message: "Outstanding confidence! You came across as assured and professional.",
    severity: Severity::Success,
};

const CAMERA_AND_POSTURE: Suggestion = Suggestion {
    title: "Camera & Posture",
    message: "Remember to look directly at the camera (not the screen), sit up straight, and keep your hands visible for gestures.",
    severity: Severity::Info,
};

// ---------------------------------------------------------------------------
// generate_suggestions
// ---------------------------------------------------------------------------

/// Build the ordered coaching list for `metrics`.
///
/// Never fails.  Out-of-range values are not clamped: negative or NaN inputs
/// simply land in whichever band their comparisons select.
pub fn generate_suggestions(metrics: &Metrics) -> Vec<Suggestion> {
    let mut suggestions = Vec::with_capacity(4);

    suggestions.push(pace_suggestion(metrics.wpm));
    if let Some(tip) = filler_suggestion(metrics.fillers) {
        suggestions.push(tip);
    }
    suggestions.push(confidence_suggestion(metrics.confidence));
    suggestions.push(CAMERA_AND_POSTURE);

    suggestions
}

fn pace_suggestion(wpm: f64) -> Suggestion {
    if wpm < 100.0 {
        SPEAK_FASTER
    } else if wpm > 200.0 {
        SLOW_DOWN
    } else if wpm >= 100.0 && wpm < 130.0 {
        SLIGHTLY_FASTER
    } else if wpm > 170.0 && wpm <= 200.0 {
        SLIGHTLY_SLOWER
    } else {
        PERFECT_PACE
    }
}

fn filler_suggestion(fillers: u32) -> Option<Suggestion> {
    if fillers > 10 {
        Some(TOO_MANY_FILLERS)
    } else if fillers > 5 {
        Some(REDUCE_FILLERS)
    } else if fillers <= 3 {
        Some(GREAT_CLARITY)
    } else {
        None
    }
}

fn confidence_suggestion(confidence: f64) -> Suggestion {
    if confidence < 60.0 {
        BUILD_CONFIDENCE
    } else if confidence >= 60.0 && confidence < 80.0 {
        ALMOST_THERE
    } else {
        HIGHLY_CONFIDENT
    }
}

// ---------------------------------------------------------------------------
// Ratings
// ---------------------------------------------------------------------------

/// Grade a speaking pace: ideal band is 130–170 wpm.
pub fn rate_pace(wpm: f64) -> Rating {
    if (130.0..=170.0).contains(&wpm) {
        Rating::Good
    } else if (100.0..130.0).contains(&wpm) || (wpm > 170.0 && wpm <= 200.0) {
        Rating::Fair
    } else {
        Rating::Poor
    }
}

/// Grade a confidence score.
pub fn rate_confidence(confidence: f64) -> Rating {
    if confidence >= 80.0 {
        Rating::Good
    } else if confidence >= 60.0 {
        Rating::Fair
    } else {
        Rating::Poor
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
