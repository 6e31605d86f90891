//! Duplex connection to the streaming endpoint.
//!
//! A [`Connector`] performs the handshake and hands back a [`DuplexChannel`]:
//! two unbounded channels bridging to writer/reader tasks that own the
//! socket halves.  [`Connection`] wraps the outbound side with the
//! `Connecting → Open → Closing → Closed` state so frames are only written
//! while the socket is open.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite};

// ---------------------------------------------------------------------------
// ConnectionError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectionError {
    #[error("could not connect to the analysis service: {0}")]
    Handshake(String),

    #[error("timed out connecting to the analysis service")]
    Timeout,

    #[error("the analysis service closed the connection{}", reason_suffix(.0))]
    RemoteClosed(Option<String>),

    #[error("connection to the analysis service failed: {0}")]
    Transport(String),
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason.as_deref() {
        Some(r) if !r.is_empty() => format!(" ({r})"),
        _ => String::new(),
    }
}

impl From<tungstenite::Error> for ConnectionError {
    fn from(e: tungstenite::Error) -> Self {
        ConnectionError::Transport(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Channel types
// ---------------------------------------------------------------------------

/// Lifecycle of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Frame requests for the writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    /// Send a Close frame and shut the socket's write half.
    Close,
}

/// What the reader task observed on the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Text(String),
    /// Close frame or end of stream, with the peer's reason if any.
    Closed(Option<String>),
    Failed(String),
}

/// Both directions of an established connection.
#[derive(Debug)]
pub struct DuplexChannel {
    pub outbound: mpsc::UnboundedSender<Outbound>,
    pub inbound: mpsc::UnboundedReceiver<Inbound>,
}

impl DuplexChannel {
    /// Pair of in-memory channels: the returned `DuplexChannel` plus the
    /// peer ends.  Used by test connectors.
    pub fn pair() -> (
        Self,
        mpsc::UnboundedReceiver<Outbound>,
        mpsc::UnboundedSender<Inbound>,
    ) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (
            Self {
                outbound: out_tx,
                inbound: in_rx,
            },
            out_rx,
            in_tx,
        )
    }
}

/// Opens duplex connections to the streaming endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<DuplexChannel, ConnectionError>;
}

// ---------------------------------------------------------------------------
// WsConnector
// ---------------------------------------------------------------------------

/// WebSocket [`Connector`] built on `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    timeout: Duration,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<DuplexChannel, ConnectionError> {
        let (ws, _response) = tokio::time::timeout(self.timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| ConnectionError::Timeout)?
            .map_err(|e| ConnectionError::Handshake(e.to_string()))?;

        log::info!("stream: connected to {}", self.url);

        let (mut sink, mut stream) = ws.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<Inbound>();

        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let result = match frame {
                    Outbound::Text(text) => sink.send(tungstenite::Message::Text(text.into())).await,
                    Outbound::Close => {
                        let _ = sink.send(tungstenite::Message::Close(None)).await;
                        break;
                    }
                };
                if let Err(e) = result {
                    log::warn!("stream: write failed: {e}");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            loop {
                let inbound = match stream.next().await {
                    Some(Ok(tungstenite::Message::Text(text))) => Inbound::Text(text.to_string()),
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        Inbound::Closed(frame.map(|f| f.reason.to_string()))
                    }
                    // Binary, ping and pong frames carry nothing for us.
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => Inbound::Failed(e.to_string()),
                    None => Inbound::Closed(None),
                };
                let done = !matches!(inbound, Inbound::Text(_));
                if in_tx.send(inbound).is_err() || done {
                    break;
                }
            }
        });

        Ok(DuplexChannel {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// State-tracked outbound side of one connection.
///
/// Clones share state, so the chunk pump and the inbound reader observe the
/// same lifecycle.
#[derive(Debug, Clone)]
pub struct Connection {
    state: Arc<Mutex<ConnectionState>>,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
}

impl Connection {
    /// A connection whose handshake has not completed.
    pub fn connecting() -> Self {
        Self {
            state: Arc::new(Mutex::new(ConnectionState::Connecting)),
            outbound: None,
        }
    }

    /// Attach the writer side after a successful handshake.
    pub fn attach(&mut self, outbound: mpsc::UnboundedSender<Outbound>) {
        self.outbound = Some(outbound);
        *self.lock_state() = ConnectionState::Open;
    }

    pub fn state(&self) -> ConnectionState {
        *self.lock_state()
    }

    /// Queue a text frame.  Returns `false` (and sends nothing) unless the
    /// connection is `Open`.
    pub fn send_text(&self, text: String) -> bool {
        let mut state = self.lock_state();
        if *state != ConnectionState::Open {
            log::debug!("stream: dropping frame, connection is {:?}", *state);
            return false;
        }
        match &self.outbound {
            Some(tx) if tx.send(Outbound::Text(text)).is_ok() => true,
            _ => {
                log::debug!("stream: writer gone, marking connection closed");
                *state = ConnectionState::Closed;
                false
            }
        }
    }

    /// Begin a client-initiated close.  Only the first call from `Open`
    /// sends a Close frame.
    pub fn close(&self) {
        let mut state = self.lock_state();
        match *state {
            ConnectionState::Open => {
                *state = ConnectionState::Closing;
                if let Some(tx) = &self.outbound {
                    let _ = tx.send(Outbound::Close);
                }
            }
            ConnectionState::Connecting => *state = ConnectionState::Closed,
            ConnectionState::Closing | ConnectionState::Closed => {}
        }
    }

    /// Record that the socket is gone.  Returns the state it was in.
    pub fn mark_closed(&self) -> ConnectionState {
        std::mem::replace(&mut *self.lock_state(), ConnectionState::Closed)
    }

    fn lock_state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
