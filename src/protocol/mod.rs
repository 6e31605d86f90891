//! Wire protocols spoken with the analysis service.
//!
//! - [`streaming`]  — live chunked audio over a WebSocket, preview metrics back
//! - [`upload`]     — one-shot multipart submission of a complete file
//! - [`question`]   — practice question source
//! - [`client`]     — reqwest implementation of the HTTP seams
//! - [`connection`] — duplex connection lifecycle and the WebSocket connector
//! - [`wire`]       — JSON payloads

pub mod client;
pub mod connection;
pub mod question;
pub mod streaming;
pub mod upload;
pub mod wire;

pub use client::ServiceClient;
pub use connection::{
    Connection, ConnectionError, ConnectionState, Connector, DuplexChannel, Inbound, Outbound,
    WsConnector,
};
pub use question::{QuestionError, QuestionSource};
pub use streaming::{StreamConfig, StreamEvent, StreamingSession};
pub use upload::{AnalyzeError, Analyzer, MediaFile};
