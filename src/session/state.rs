//! Session state machine and the shared session snapshot.
//!
//! [`Session::apply`] is the only way a session changes.  It accepts the
//! events listed for the current [`Phase`] and ignores everything else,
//! leaving the session untouched:
//!
//! ```text
//! Idle ──question──▶ QuestionReady ──start ok──▶ Recording
//!                    (new question,                 │ stop / connection lost
//!                     start failed)                 ▼
//!                                            RecordingStopped
//!                                                   │ file chosen
//!                                                   ▼
//!                        analysis failed ──▶ UploadPending (file chosen again)
//!                                                   │ analyze
//!                                                   ▼
//!                                               Analyzing ──ok──▶ Analyzed ──restart──▶ Idle
//! ```
//!
//! [`SharedSession`] carries a snapshot of the session to the UI.  Only the
//! orchestrator writes it.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::capture::DeviceError;
use crate::metrics::Metrics;
use crate::protocol::{AnalyzeError, ConnectionError, MediaFile, QuestionError};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No question yet.
    #[default]
    Idle,
    /// A question is shown; recording may start.
    QuestionReady,
    /// Microphone and connection are live.
    Recording,
    /// Live recording ended; waiting for a file to analyse.
    RecordingStopped,
    /// A file is chosen and can be submitted.
    UploadPending,
    /// Upload in flight.
    Analyzing,
    /// Final metrics are available.
    Analyzed,
}

impl Phase {
    pub const ALL: [Phase; 7] = [
        Phase::Idle,
        Phase::QuestionReady,
        Phase::Recording,
        Phase::RecordingStopped,
        Phase::UploadPending,
        Phase::Analyzing,
        Phase::Analyzed,
    ];

    /// `true` while the session is holding a device, socket or request.
    ///
    /// ```
    /// use interview_coach::session::Phase;
    ///
    /// assert!(Phase::Recording.is_busy());
    /// assert!(Phase::Analyzing.is_busy());
    /// assert!(!Phase::UploadPending.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(self, Phase::Recording | Phase::Analyzing)
    }

    /// Short label for the status line.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "Ready",
            Phase::QuestionReady => "Question ready",
            Phase::Recording => "Recording",
            Phase::RecordingStopped => "Recording stopped",
            Phase::UploadPending => "File selected",
            Phase::Analyzing => "Analyzing",
            Phase::Analyzed => "Results",
        }
    }
}

// ---------------------------------------------------------------------------
// Notice
// ---------------------------------------------------------------------------

/// The last problem worth telling the user about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Device(DeviceError),
    Connection(ConnectionError),
    ConnectionLost(ConnectionError),
    Analysis(AnalyzeError),
    Question(QuestionError),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Device(e) => write!(f, "Could not start the microphone: {e}"),
            Notice::Connection(e) => write!(f, "Could not start live feedback: {e}"),
            Notice::ConnectionLost(e) => write!(f, "Live feedback stopped: {e}"),
            Notice::Analysis(e) => write!(f, "Analysis failed, you can try again: {e}"),
            Notice::Question(e) => write!(f, "Could not load a question: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Why starting a live recording failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StartError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl From<StartError> for Notice {
    fn from(e: StartError) -> Self {
        match e {
            StartError::Device(e) => Notice::Device(e),
            StartError::Connection(e) => Notice::Connection(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopCause {
    User,
    ConnectionLost(ConnectionError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    QuestionFetched(String),
    QuestionFailed(QuestionError),
    RecordingStarted,
    StartFailed(StartError),
    PreviewReceived(Metrics),
    RecordingStopped(StopCause),
    FileChosen(MediaFile),
    AnalyzeRequested,
    AnalysisSucceeded(Metrics),
    AnalysisFailed(AnalyzeError),
    Restart,
}

impl SessionEvent {
    /// Variant name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::QuestionFetched(_) => "QuestionFetched",
            SessionEvent::QuestionFailed(_) => "QuestionFailed",
            SessionEvent::RecordingStarted => "RecordingStarted",
            SessionEvent::StartFailed(_) => "StartFailed",
            SessionEvent::PreviewReceived(_) => "PreviewReceived",
            SessionEvent::RecordingStopped(_) => "RecordingStopped",
            SessionEvent::FileChosen(_) => "FileChosen",
            SessionEvent::AnalyzeRequested => "AnalyzeRequested",
            SessionEvent::AnalysisSucceeded(_) => "AnalysisSucceeded",
            SessionEvent::AnalysisFailed(_) => "AnalysisFailed",
            SessionEvent::Restart => "Restart",
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One practice attempt, from question to final metrics.
///
/// `metrics` is `Some` exactly when `phase == Analyzed`; `question` is `Some`
/// in every phase after `Idle`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub phase: Phase,
    pub question: Option<String>,
    pub metrics: Option<Metrics>,
    pub uploaded_file: Option<MediaFile>,
    /// Latest live metrics.  Never final.
    pub preview: Option<Metrics>,
    pub notice: Option<Notice>,
    /// A live recording is being started (device or handshake pending).
    /// Maintained by the orchestrator, not by [`Session::apply`].
    pub connecting: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `event` if the current phase accepts it.
    ///
    /// Returns `false`, with nothing changed, for events the phase does not
    /// list.
    pub fn apply(&mut self, event: SessionEvent) -> bool {
        use Phase::*;
        use SessionEvent as E;

        let from = self.phase;
        let name = event.name();

        match (from, event) {
            (Idle | QuestionReady, E::QuestionFetched(question)) => {
                self.question = Some(question);
                self.preview = None;
                self.metrics = None;
                self.notice = None;
                self.phase = QuestionReady;
            }
            (Idle | QuestionReady, E::QuestionFailed(e)) => {
                self.notice = Some(Notice::Question(e));
            }
            (QuestionReady, E::RecordingStarted) => {
                self.preview = None;
                self.notice = None;
                self.phase = Recording;
            }
            (QuestionReady, E::StartFailed(e)) => {
                self.notice = Some(e.into());
            }
            (Recording, E::PreviewReceived(metrics)) => {
                self.preview = Some(metrics);
            }
            (Recording, E::RecordingStopped(cause)) => {
                if let StopCause::ConnectionLost(e) = cause {
                    self.notice = Some(Notice::ConnectionLost(e));
                }
                self.phase = RecordingStopped;
            }
            (RecordingStopped | UploadPending, E::FileChosen(file)) => {
                self.uploaded_file = Some(file);
                self.notice = None;
                self.phase = UploadPending;
            }
            (UploadPending, E::AnalyzeRequested) if self.uploaded_file.is_some() => {
                self.notice = None;
                self.phase = Analyzing;
            }
            (Analyzing, E::AnalysisSucceeded(metrics)) => {
                self.metrics = Some(metrics);
                self.phase = Analyzed;
            }
            (Analyzing, E::AnalysisFailed(e)) => {
                self.notice = Some(Notice::Analysis(e));
                self.phase = UploadPending;
            }
            (Analyzed, E::Restart) => {
                *self = Session::default();
            }
            _ => {
                log::debug!("session: ignoring {name} in {from:?}");
                return false;
            }
        }

        if self.phase != from {
            log::info!("session: {from:?} → {:?} ({name})", self.phase);
        }
        true
    }
}

// ---------------------------------------------------------------------------
// SharedSession
// ---------------------------------------------------------------------------

/// Snapshot of the session shared with the UI.
pub type SharedSession = Arc<Mutex<Session>>;

pub fn new_shared_session() -> SharedSession {
    Arc::new(Mutex::new(Session::new()))
}

/// Lock the shared snapshot, recovering it if a writer panicked.
pub fn lock_session(shared: &SharedSession) -> MutexGuard<'_, Session> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
