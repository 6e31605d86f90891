//! Interview practice client.
//!
//! Captures a spoken answer live from the microphone or takes a recorded
//! file, sends it to a remote analysis service, and turns the returned
//! metrics into coaching feedback.
//!
//! - [`session`]  — phase state machine and the async orchestrator
//! - [`protocol`] — WebSocket streaming, multipart upload, question source
//! - [`capture`]  — cpal microphone capture and Opus/WebM chunk encoding
//! - [`feedback`] — rule-based coaching suggestions
//! - [`config`]   — TOML settings
//! - [`app`]      — egui window

pub mod app;
pub mod capture;
pub mod config;
pub mod feedback;
pub mod metrics;
pub mod protocol;
pub mod session;
