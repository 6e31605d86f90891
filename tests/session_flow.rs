//! End-to-end session flows driven through the orchestrator with in-memory
//! collaborators.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use interview_coach::capture::{
    DeviceError, DeviceStream, MediaDevice, MediaStreamHandle, SampleBuffer,
};
use interview_coach::feedback::{generate_suggestions, Severity};
use interview_coach::metrics::Metrics;
use interview_coach::protocol::{
    AnalyzeError, Analyzer, ConnectionError, Connector, DuplexChannel, Inbound, MediaFile,
    Outbound, QuestionError, QuestionSource, StreamConfig,
};
use interview_coach::session::{
    lock_session, new_shared_session, Notice, Phase, Session, SessionCommand,
    SessionOrchestrator, Services, SharedSession,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct CountingStream(Arc<AtomicUsize>);

impl DeviceStream for CountingStream {
    fn stop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakeMicrophone {
    acquired: AtomicUsize,
    released: Arc<AtomicUsize>,
}

#[async_trait]
impl MediaDevice for FakeMicrophone {
    async fn acquire(&self) -> Result<MediaStreamHandle, DeviceError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(MediaStreamHandle::new(
            Box::new(CountingStream(Arc::clone(&self.released))),
            SampleBuffer::shared(16_000),
            16_000,
        ))
    }
}

type Peer = (
    mpsc::UnboundedReceiver<Outbound>,
    mpsc::UnboundedSender<Inbound>,
);

#[derive(Default)]
struct FakeServer {
    refuse: Option<ConnectionError>,
    peer: Mutex<Option<Peer>>,
}

impl FakeServer {
    fn peer(&self) -> Peer {
        self.peer.lock().unwrap().take().expect("no connection was made")
    }
}

#[async_trait]
impl Connector for FakeServer {
    async fn connect(&self) -> Result<DuplexChannel, ConnectionError> {
        if let Some(e) = &self.refuse {
            return Err(e.clone());
        }
        let (channel, out_rx, in_tx) = DuplexChannel::pair();
        *self.peer.lock().unwrap() = Some((out_rx, in_tx));
        Ok(channel)
    }
}

struct FixedQuestion(&'static str);

#[async_trait]
impl QuestionSource for FixedQuestion {
    async fn fetch_question(&self) -> Result<String, QuestionError> {
        Ok(self.0.to_string())
    }
}

/// Replays queued results; waits on `gate` first when one is set.
#[derive(Default)]
struct ScriptedAnalyzer {
    results: Mutex<VecDeque<Result<Metrics, AnalyzeError>>>,
    files: Mutex<Vec<MediaFile>>,
    gate: Option<Notify>,
}

impl ScriptedAnalyzer {
    fn with(results: Vec<Result<Metrics, AnalyzeError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    async fn analyze(&self, file: &MediaFile) -> Result<Metrics, AnalyzeError> {
        self.files.lock().unwrap().push(file.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AnalyzeError::Transfer("no scripted result".into())))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Client {
    shared: SharedSession,
    commands: mpsc::Sender<SessionCommand>,
    microphone: Arc<FakeMicrophone>,
    server: Arc<FakeServer>,
    analyzer: Arc<ScriptedAnalyzer>,
    _task: JoinHandle<()>,
}

fn client(server: FakeServer, analyzer: ScriptedAnalyzer) -> Client {
    let shared = new_shared_session();
    let microphone = Arc::new(FakeMicrophone::default());
    let server = Arc::new(server);
    let analyzer = Arc::new(analyzer);

    let services = Services {
        device: microphone.clone(),
        connector: server.clone(),
        questions: Arc::new(FixedQuestion("Tell me about a project you are proud of.")),
        analyzer: analyzer.clone(),
    };
    let orchestrator = SessionOrchestrator::new(
        Arc::clone(&shared),
        services,
        StreamConfig {
            chunk_interval: Duration::from_secs(2),
        },
    );
    let (commands, rx) = mpsc::channel(16);
    let task = tokio::spawn(orchestrator.run(rx));

    Client {
        shared,
        commands,
        microphone,
        server,
        analyzer,
        _task: task,
    }
}

impl Client {
    async fn send(&self, command: SessionCommand) {
        self.commands.send(command).await.unwrap();
    }

    fn session(&self) -> Session {
        lock_session(&self.shared).clone()
    }

    async fn wait_until(&self, what: &str, check: impl Fn(&Session) -> bool) -> Session {
        let shared = Arc::clone(&self.shared);
        let found = tokio::time::timeout(Duration::from_secs(5), async move {
            loop {
                let session = lock_session(&shared).clone();
                if check(&session) {
                    return session;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        match found {
            Ok(session) => session,
            Err(_) => panic!("timed out waiting for {what}; session is {:?}", self.session()),
        }
    }

    async fn wait_for(&self, phase: Phase) -> Session {
        self.wait_until(&format!("{phase:?}"), |s| s.phase == phase).await
    }

    async fn record(&self) -> Peer {
        self.send(SessionCommand::FetchQuestion).await;
        self.wait_for(Phase::QuestionReady).await;
        self.send(SessionCommand::StartRecording).await;
        self.wait_for(Phase::Recording).await;
        self.server.peer()
    }
}

fn final_metrics() -> Metrics {
    Metrics {
        transcript: "I rebuilt our deploy pipeline and cut release time in half.".into(),
        fillers: 2,
        wpm: 140.0,
        confidence: 85.0,
    }
}

fn answer() -> PathBuf {
    PathBuf::from("/recordings/answer.webm")
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn live_recording_then_upload_then_restart() {
    let c = client(FakeServer::default(), ScriptedAnalyzer::with(vec![Ok(final_metrics())]));

    let (mut out_rx, in_tx) = c.record().await;
    in_tx
        .send(Inbound::Text(r#"{"transcript":"I rebuilt","wpm":118,"fillers":1,"confidence":62}"#.into()))
        .unwrap();
    let live = c.wait_until("preview", |s| s.preview.is_some()).await;
    assert_eq!(live.preview.as_ref().map(|m| m.wpm), Some(118.0));
    assert!(live.metrics.is_none());

    c.send(SessionCommand::StopRecording).await;
    let stopped = c.wait_for(Phase::RecordingStopped).await;
    assert!(stopped.preview.is_some());
    assert!(stopped.metrics.is_none());
    assert_eq!(c.microphone.released.load(Ordering::SeqCst), 1);
    assert_eq!(out_rx.recv().await, Some(Outbound::Close));

    c.send(SessionCommand::ChooseFile(answer())).await;
    c.wait_for(Phase::UploadPending).await;
    c.send(SessionCommand::Analyze).await;
    let done = c.wait_for(Phase::Analyzed).await;
    assert_eq!(done.metrics, Some(final_metrics()));
    assert_eq!(done.question.as_deref(), Some("Tell me about a project you are proud of."));

    c.send(SessionCommand::Restart).await;
    let fresh = c.wait_for(Phase::Idle).await;
    assert_eq!(fresh, Session::default());
}

#[tokio::test]
async fn analyzed_metrics_produce_expected_coaching() {
    let c = client(FakeServer::default(), ScriptedAnalyzer::with(vec![Ok(final_metrics())]));
    c.record().await;
    c.send(SessionCommand::StopRecording).await;
    c.wait_for(Phase::RecordingStopped).await;
    c.send(SessionCommand::ChooseFile(answer())).await;
    c.send(SessionCommand::Analyze).await;

    let done = c.wait_for(Phase::Analyzed).await;
    let metrics = done.metrics.expect("final metrics");
    let tips = generate_suggestions(&metrics);

    let titles: Vec<_> = tips.iter().map(|t| t.title).collect();
    assert_eq!(
        titles,
        ["Perfect Pace", "Great Clarity", "Highly Confident", "Camera & Posture"]
    );
    let severities: Vec<_> = tips.iter().map(|t| t.severity).collect();
    assert_eq!(
        severities,
        [Severity::Success, Severity::Success, Severity::Success, Severity::Info]
    );
}

#[tokio::test]
async fn transfer_failure_keeps_file_and_allows_retry() {
    let c = client(
        FakeServer::default(),
        ScriptedAnalyzer::with(vec![
            Err(AnalyzeError::Transfer("connection reset".into())),
            Ok(final_metrics()),
        ]),
    );
    c.record().await;
    c.send(SessionCommand::StopRecording).await;
    c.wait_for(Phase::RecordingStopped).await;
    c.send(SessionCommand::ChooseFile(answer())).await;
    c.send(SessionCommand::Analyze).await;

    let failed = c
        .wait_until("analysis failure", |s| {
            s.phase == Phase::UploadPending && s.notice.is_some()
        })
        .await;
    assert_eq!(failed.uploaded_file, Some(MediaFile::new(answer())));
    assert!(matches!(failed.notice, Some(Notice::Analysis(AnalyzeError::Transfer(_)))));
    assert!(failed.metrics.is_none());

    c.send(SessionCommand::Analyze).await;
    let done = c.wait_for(Phase::Analyzed).await;
    assert_eq!(done.metrics, Some(final_metrics()));
    assert!(done.notice.is_none());

    let files = c.analyzer.files.lock().unwrap().clone();
    assert_eq!(files, vec![MediaFile::new(answer()), MediaFile::new(answer())]);
}

#[tokio::test]
async fn previews_apply_in_arrival_order() {
    let c = client(FakeServer::default(), ScriptedAnalyzer::default());
    let (_out_rx, in_tx) = c.record().await;

    for frame in [
        r#"{"transcript":"well","fillers":3,"wpm":95,"confidence":50}"#,
        r#"{"transcript":"well I","wpm":105}"#,
        r#"{"wpm":120,"confidence":70}"#,
    ] {
        in_tx.send(Inbound::Text(frame.into())).unwrap();
    }

    let expected = Metrics {
        transcript: String::new(),
        fillers: 0,
        wpm: 120.0,
        confidence: 70.0,
    };
    let session = c
        .wait_until("third preview", |s| s.preview.as_ref() == Some(&expected))
        .await;
    assert_eq!(session.phase, Phase::Recording);
}

#[tokio::test]
async fn connection_loss_stops_recording_and_releases_microphone() {
    let c = client(FakeServer::default(), ScriptedAnalyzer::default());
    let (_out_rx, in_tx) = c.record().await;
    in_tx.send(Inbound::Text(r#"{"wpm":130}"#.into())).unwrap();
    c.wait_until("preview", |s| s.preview.is_some()).await;

    in_tx.send(Inbound::Failed("connection reset by peer".into())).unwrap();
    let stopped = c.wait_for(Phase::RecordingStopped).await;

    assert!(matches!(stopped.notice, Some(Notice::ConnectionLost(_))));
    assert_eq!(stopped.preview.as_ref().map(|m| m.wpm), Some(130.0));
    assert!(stopped.metrics.is_none());
    assert_eq!(c.microphone.released.load(Ordering::SeqCst), 1);

    // A stop after the loss changes nothing.
    c.send(SessionCommand::StopRecording).await;
    c.send(SessionCommand::ChooseFile(answer())).await;
    c.wait_for(Phase::UploadPending).await;
    assert_eq!(c.microphone.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refused_connection_releases_microphone_and_stays_ready() {
    let server = FakeServer {
        refuse: Some(ConnectionError::Handshake("connection refused".into())),
        ..FakeServer::default()
    };
    let c = client(server, ScriptedAnalyzer::default());
    c.send(SessionCommand::FetchQuestion).await;
    c.wait_for(Phase::QuestionReady).await;

    c.send(SessionCommand::StartRecording).await;
    let session = c.wait_until("notice", |s| s.notice.is_some()).await;

    assert_eq!(session.phase, Phase::QuestionReady);
    assert!(matches!(session.notice, Some(Notice::Connection(_))));
    assert_eq!(c.microphone.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(c.microphone.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn second_analyze_while_analyzing_is_ignored() {
    let analyzer = ScriptedAnalyzer {
        gate: Some(Notify::new()),
        ..ScriptedAnalyzer::with(vec![Ok(final_metrics())])
    };
    let c = client(FakeServer::default(), analyzer);
    c.record().await;
    c.send(SessionCommand::StopRecording).await;
    c.wait_for(Phase::RecordingStopped).await;
    c.send(SessionCommand::ChooseFile(answer())).await;
    c.send(SessionCommand::Analyze).await;
    c.wait_for(Phase::Analyzing).await;

    c.send(SessionCommand::Analyze).await;
    c.send(SessionCommand::ChooseFile("/recordings/other.webm".into())).await;
    c.wait_until("upload started", |_| c.analyzer.calls() == 1).await;

    if let Some(gate) = &c.analyzer.gate {
        gate.notify_one();
    }
    let done = c.wait_for(Phase::Analyzed).await;
    assert_eq!(c.analyzer.calls(), 1);
    assert_eq!(done.uploaded_file, Some(MediaFile::new(answer())));
}
