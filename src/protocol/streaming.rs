//! Live-recording protocol: chunked audio out, preview metrics in.
//!
//! A [`StreamingSession`] owns everything a live recording holds open:
//!
//! - the [`Connection`] to the streaming endpoint
//! - the [`MediaStreamHandle`] for the microphone
//! - a pump task sending one `{"audio": …}` frame per encoded chunk
//! - a reader task decoding inbound updates into [`StreamEvent`]s
//!
//! [`close`](StreamingSession::close) tears these down in a fixed order:
//! stop the chunk timer, send the final flush, close the connection, release
//! the device.  Dropping the session without closing it aborts the tasks
//! and releases the device as well.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::capture::{AudioChunk, ChunkSource, MediaStreamHandle};
use crate::config::CaptureConfig;
use crate::metrics::Metrics;

use super::connection::{Connection, ConnectionError, ConnectionState, Connector, Inbound};
use super::wire::{AudioEnvelope, LiveUpdate};

/// Something the session observed that the orchestrator must act on.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Latest live metrics.  Replaces any previous preview.
    Preview(Metrics),
    /// The connection dropped before [`StreamingSession::close`].
    /// Emitted at most once.
    Disconnected(ConnectionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub chunk_interval: Duration,
}

impl StreamConfig {
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            chunk_interval: config.chunk_interval(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::from_config(&CaptureConfig::default())
    }
}

pub struct StreamingSession {
    connection: Connection,
    handle: Option<MediaStreamHandle>,
    pump: Option<(oneshot::Sender<()>, JoinHandle<()>)>,
    reader: Option<JoinHandle<()>>,
}

impl StreamingSession {
    /// Connect and start streaming chunks from `handle`.
    ///
    /// On failure the handle is released before the error is returned.
    pub async fn open(
        connector: &dyn Connector,
        mut handle: MediaStreamHandle,
        config: &StreamConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<StreamEvent>), ConnectionError> {
        let mut connection = Connection::connecting();
        let channel = match connector.connect().await {
            Ok(channel) => channel,
            Err(e) => {
                log::warn!("stream: {e}");
                connection.mark_closed();
                handle.release();
                return Err(e);
            }
        };
        connection.attach(channel.outbound);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_inbound(channel.inbound, connection.clone(), event_tx));

        let source = handle.begin_encoding(config.chunk_interval);
        let (stop_tx, stop_rx) = oneshot::channel();
        let pump = tokio::spawn(pump_chunks(source, connection.clone(), stop_rx));

        log::info!(
            "stream: recording, one chunk every {} ms",
            config.chunk_interval.as_millis()
        );

        let session = Self {
            connection,
            handle: Some(handle),
            pump: Some((stop_tx, pump)),
            reader: Some(reader),
        };
        Ok((session, event_rx))
    }

    /// Stop streaming and give back every resource.  Safe to call more than
    /// once and from any connection state.
    pub async fn close(&mut self) {
        if let Some((stop_tx, pump)) = self.pump.take() {
            let _ = stop_tx.send(());
            if let Err(e) = pump.await {
                log::error!("stream: chunk pump ended abnormally: {e}");
            }
        }

        self.connection.close();

        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.connection.mark_closed();

        if let Some(mut handle) = self.handle.take() {
            handle.release();
            log::info!("stream: closed");
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// `true` once [`close`](Self::close) has completed.
    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }
}

impl Drop for StreamingSession {
    fn drop(&mut self) {
        if let Some((_, pump)) = self.pump.take() {
            pump.abort();
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.connection.close();
        // `handle` releases the device in its own Drop.
    }
}

impl std::fmt::Debug for StreamingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingSession")
            .field("connection", &self.connection.state())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

async fn pump_chunks(
    mut source: ChunkSource,
    connection: Connection,
    mut stop_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            chunk = source.next_chunk() => send_chunk(&connection, &chunk),
        }
    }

    if let Some(chunk) = source.flush() {
        send_chunk(&connection, &chunk);
    }
}

fn send_chunk(connection: &Connection, chunk: &AudioChunk) {
    match AudioEnvelope::from_bytes(&chunk.data).to_json() {
        Ok(json) => {
            if connection.send_text(json) {
                log::debug!("stream: sent {} ms chunk", chunk.duration().as_millis());
            } else {
                log::debug!("stream: dropped {} ms chunk", chunk.duration().as_millis());
            }
        }
        Err(e) => log::error!("stream: could not serialise chunk: {e}"),
    }
}

async fn read_inbound(
    mut inbound: mpsc::UnboundedReceiver<Inbound>,
    connection: Connection,
    events: mpsc::UnboundedSender<StreamEvent>,
) {
    while let Some(frame) = inbound.recv().await {
        match frame {
            Inbound::Text(text) => match LiveUpdate::parse(&text) {
                Ok(update) => {
                    let _ = events.send(StreamEvent::Preview(update.into()));
                }
                Err(e) => log::warn!("stream: skipping undecodable update: {e}"),
            },
            Inbound::Closed(reason) => {
                report_lost(&connection, &events, ConnectionError::RemoteClosed(reason));
                return;
            }
            Inbound::Failed(e) => {
                report_lost(&connection, &events, ConnectionError::Transport(e));
                return;
            }
        }
    }
    report_lost(&connection, &events, ConnectionError::RemoteClosed(None));
}

/// Emit `Disconnected` only when the drop was not initiated by us.
fn report_lost(
    connection: &Connection,
    events: &mpsc::UnboundedSender<StreamEvent>,
    error: ConnectionError,
) {
    match connection.mark_closed() {
        ConnectionState::Open => {
            log::warn!("stream: {error}");
            let _ = events.send(StreamEvent::Disconnected(error));
        }
        state => log::debug!("stream: socket ended while {state:?}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
