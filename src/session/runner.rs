//! Session orchestrator: executes side effects and owns the session.
//!
//! [`SessionOrchestrator`] receives [`SessionCommand`]s from the UI over a
//! `tokio::sync::mpsc` channel.  Slow work (device start-up, handshake,
//! question fetch, upload) runs in spawned tasks that post a completion back
//! into the orchestrator's own channel, so the loop never blocks on I/O and
//! every result is applied to the [`Session`] in arrival order.
//!
//! # Flow
//!
//! ```text
//! FetchQuestion  └─▶ spawn questions.fetch_question      ─▶ QuestionFetched / QuestionFailed
//! StartRecording └─▶ spawn device.acquire + stream open  ─▶ RecordingStarted / StartFailed
//! StopRecording  └─▶ close stream (flush, close, release) ─▶ RecordingStopped
//! ChooseFile     └─▶ FileChosen
//! Analyze        └─▶ AnalyzeRequested, spawn analyzer     ─▶ AnalysisSucceeded / AnalysisFailed
//! Restart        └─▶ Restart
//! ```
//!
//! After every step the session is copied into [`SharedSession`] for the UI.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::capture::MediaDevice;
use crate::metrics::Metrics;
use crate::protocol::{
    AnalyzeError, Analyzer, Connector, MediaFile, QuestionError, QuestionSource, StreamConfig,
    StreamEvent, StreamingSession,
};

use super::state::{
    lock_session, Phase, Session, SessionEvent, SharedSession, StartError, StopCause,
};

/// User intent sent from the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    FetchQuestion,
    StartRecording,
    /// Stop a live recording, or cancel one that is still starting.
    StopRecording,
    ChooseFile(PathBuf),
    Analyze,
    Restart,
}

/// External collaborators the orchestrator drives.
#[derive(Clone)]
pub struct Services {
    pub device: Arc<dyn MediaDevice>,
    pub connector: Arc<dyn Connector>,
    pub questions: Arc<dyn QuestionSource>,
    pub analyzer: Arc<dyn Analyzer>,
}

type OpenStream = (StreamingSession, mpsc::UnboundedReceiver<StreamEvent>);

/// Results posted back by spawned tasks.
enum Completion {
    Question(Result<String, QuestionError>),
    /// Tagged with the start attempt that produced it.
    Started(u64, Result<OpenStream, StartError>),
    Analysis(Result<Metrics, AnalyzeError>),
}

struct ActiveStream {
    session: StreamingSession,
    /// `None` once the reader has finished.
    events: Option<mpsc::UnboundedReceiver<StreamEvent>>,
}

pub struct SessionOrchestrator {
    shared: SharedSession,
    session: Session,
    services: Services,
    stream_config: StreamConfig,
    streaming: Option<ActiveStream>,
    /// Attempt id and task of the start in progress.
    pending_start: Option<(u64, JoinHandle<()>)>,
    next_start_id: u64,
    question_in_flight: bool,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl SessionOrchestrator {
    pub fn new(shared: SharedSession, services: Services, stream_config: StreamConfig) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            shared,
            session: Session::new(),
            services,
            stream_config,
            streaming: None,
            pending_start: None,
            next_start_id: 0,
            question_in_flight: false,
            completions_tx,
            completions_rx,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until `commands` is closed, then release anything still open.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        self.publish();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(done) = self.completions_rx.recv() => self.handle_completion(done).await,
                event = next_stream_event(&mut self.streaming) => self.handle_stream_event(event).await,
            }
            self.publish();
        }

        self.shutdown().await;
        log::info!("session: command channel closed, orchestrator shutting down");
    }

    fn publish(&mut self) {
        self.session.connecting = self.pending_start.is_some();
        *lock_session(&self.shared) = self.session.clone();
    }

    async fn shutdown(&mut self) {
        if let Some((_, pending)) = self.pending_start.take() {
            pending.abort();
        }
        if let Some(mut active) = self.streaming.take() {
            active.session.close().await;
        }
        self.publish();
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    async fn handle_command(&mut self, command: SessionCommand) {
        log::debug!("session: {command:?} in {:?}", self.session.phase);

        match command {
            SessionCommand::FetchQuestion => self.fetch_question(),
            SessionCommand::StartRecording => self.start_recording(),
            SessionCommand::StopRecording => self.stop_recording(StopCause::User).await,
            SessionCommand::ChooseFile(path) => {
                self.session.apply(SessionEvent::FileChosen(MediaFile::new(path)));
            }
            SessionCommand::Analyze => self.analyze(),
            SessionCommand::Restart => {
                self.session.apply(SessionEvent::Restart);
            }
        }
    }

    fn fetch_question(&mut self) {
        if !matches!(self.session.phase, Phase::Idle | Phase::QuestionReady) || self.question_in_flight {
            return;
        }
        self.question_in_flight = true;

        let questions = Arc::clone(&self.services.questions);
        let done = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = questions.fetch_question().await;
            let _ = done.send(Completion::Question(result));
        });
    }

    fn start_recording(&mut self) {
        if self.session.phase != Phase::QuestionReady || self.pending_start.is_some() {
            return;
        }

        self.next_start_id += 1;
        let id = self.next_start_id;
        let device = Arc::clone(&self.services.device);
        let connector = Arc::clone(&self.services.connector);
        let config = self.stream_config;
        let done = self.completions_tx.clone();
        let task = tokio::spawn(async move {
            let result = open_live_stream(device.as_ref(), connector.as_ref(), &config).await;
            let _ = done.send(Completion::Started(id, result));
        });
        self.pending_start = Some((id, task));
    }

    async fn stop_recording(&mut self, cause: StopCause) {
        if let Some((id, pending)) = self.pending_start.take() {
            // Dropping the start future releases a device it already holds.
            // If it already finished, its completion arrives as stale.
            pending.abort();
            log::info!("session: recording start #{id} cancelled");
        }

        let Some(mut active) = self.streaming.take() else {
            return;
        };
        active.session.close().await;
        self.session.apply(SessionEvent::RecordingStopped(cause));
    }

    fn analyze(&mut self) {
        let Some(file) = self.session.uploaded_file.clone() else {
            return;
        };
        if !self.session.apply(SessionEvent::AnalyzeRequested) {
            return;
        }

        let analyzer = Arc::clone(&self.services.analyzer);
        let done = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = analyzer.analyze(&file).await;
            let _ = done.send(Completion::Analysis(result));
        });
    }

    // -----------------------------------------------------------------------
    // Completions and stream events
    // -----------------------------------------------------------------------

    async fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::Question(result) => {
                self.question_in_flight = false;
                let event = match result {
                    Ok(question) => SessionEvent::QuestionFetched(question),
                    Err(e) => {
                        log::warn!("session: question fetch failed: {e}");
                        SessionEvent::QuestionFailed(e)
                    }
                };
                self.session.apply(event);
            }

            Completion::Started(id, result) => {
                // Only the attempt still pending may become the recording.
                let current = matches!(self.pending_start, Some((pending, _)) if pending == id);
                if !current {
                    if let Ok((mut stale, _)) = result {
                        log::info!("session: discarding cancelled recording start #{id}");
                        stale.close().await;
                    }
                    return;
                }
                self.pending_start = None;

                match result {
                    Ok((mut stream, events)) => {
                        if self.session.apply(SessionEvent::RecordingStarted) {
                            self.streaming = Some(ActiveStream {
                                session: stream,
                                events: Some(events),
                            });
                        } else {
                            stream.close().await;
                        }
                    }
                    Err(e) => {
                        log::warn!("session: could not start recording: {e}");
                        self.session.apply(SessionEvent::StartFailed(e));
                    }
                }
            }

            Completion::Analysis(result) => {
                let event = match result {
                    Ok(metrics) => SessionEvent::AnalysisSucceeded(metrics),
                    Err(e) => {
                        log::warn!("session: analysis failed: {e}");
                        SessionEvent::AnalysisFailed(e)
                    }
                };
                self.session.apply(event);
            }
        }
    }

    async fn handle_stream_event(&mut self, event: Option<StreamEvent>) {
        match event {
            Some(StreamEvent::Preview(metrics)) => {
                self.session.apply(SessionEvent::PreviewReceived(metrics));
            }
            Some(StreamEvent::Disconnected(e)) => {
                self.stop_recording(StopCause::ConnectionLost(e)).await;
            }
            None => {
                if let Some(active) = self.streaming.as_mut() {
                    active.events = None;
                }
            }
        }
    }
}

async fn open_live_stream(
    device: &dyn MediaDevice,
    connector: &dyn Connector,
    config: &StreamConfig,
) -> Result<OpenStream, StartError> {
    let handle = device.acquire().await?;
    Ok(StreamingSession::open(connector, handle, config).await?)
}

/// Next event from the live stream; pending forever when there is none.
async fn next_stream_event(streaming: &mut Option<ActiveStream>) -> Option<StreamEvent> {
    match streaming.as_mut().and_then(|active| active.events.as_mut()) {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{DeviceError, DeviceStream, MediaStreamHandle, SampleBuffer};
    use crate::protocol::{ConnectionError, DuplexChannel, Inbound, Outbound};
    use crate::session::state::{new_shared_session, Notice};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    // ---- fakes ----

    struct CountingStream(Arc<AtomicUsize>);

    impl DeviceStream for CountingStream {
        fn stop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeDevice {
        acquired: AtomicUsize,
        released: Arc<AtomicUsize>,
        fail: Option<DeviceError>,
    }

    #[async_trait]
    impl MediaDevice for FakeDevice {
        async fn acquire(&self) -> Result<MediaStreamHandle, DeviceError> {
            if let Some(e) = &self.fail {
                return Err(e.clone());
            }
            self.acquired.fetch_add(1, Ordering::SeqCst);
            Ok(MediaStreamHandle::new(
                Box::new(CountingStream(Arc::clone(&self.released))),
                SampleBuffer::shared(16_000),
                16_000,
            ))
        }
    }

    /// Blocks each handshake until `gate` is notified.
    #[derive(Default)]
    struct GatedConnector {
        gate: Notify,
        attempts: AtomicUsize,
        peers: Mutex<Vec<(mpsc::UnboundedReceiver<Outbound>, mpsc::UnboundedSender<Inbound>)>>,
    }

    #[async_trait]
    impl Connector for GatedConnector {
        async fn connect(&self) -> Result<DuplexChannel, ConnectionError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            let (channel, out_rx, in_tx) = DuplexChannel::pair();
            self.peers.lock().unwrap().push((out_rx, in_tx));
            Ok(channel)
        }
    }

    struct FailingQuestions;

    #[async_trait]
    impl QuestionSource for FailingQuestions {
        async fn fetch_question(&self) -> Result<String, QuestionError> {
            Err(QuestionError::Unreachable("connection refused".into()))
        }
    }

    struct FixedQuestion;

    #[async_trait]
    impl QuestionSource for FixedQuestion {
        async fn fetch_question(&self) -> Result<String, QuestionError> {
            Ok("Describe a conflict you resolved.".into())
        }
    }

    struct NeverAnalyzer;

    #[async_trait]
    impl Analyzer for NeverAnalyzer {
        async fn analyze(&self, _file: &MediaFile) -> Result<Metrics, AnalyzeError> {
            std::future::pending().await
        }
    }

    struct Harness {
        shared: SharedSession,
        commands: mpsc::Sender<SessionCommand>,
        device: Arc<FakeDevice>,
        connector: Arc<GatedConnector>,
        task: JoinHandle<()>,
    }

    fn orchestrator(
        shared: &SharedSession,
        device: &Arc<FakeDevice>,
        connector: &Arc<GatedConnector>,
        questions: Arc<dyn QuestionSource>,
    ) -> SessionOrchestrator {
        let services = Services {
            device: device.clone(),
            connector: connector.clone(),
            questions,
            analyzer: Arc::new(NeverAnalyzer),
        };
        SessionOrchestrator::new(
            Arc::clone(shared),
            services,
            StreamConfig {
                chunk_interval: Duration::from_secs(2),
            },
        )
    }

    fn harness(device: FakeDevice, questions: Arc<dyn QuestionSource>) -> Harness {
        let shared = new_shared_session();
        let device = Arc::new(device);
        let connector = Arc::new(GatedConnector::default());
        let orchestrator = orchestrator(&shared, &device, &connector, questions);
        let (commands, rx) = mpsc::channel(16);
        let task = tokio::spawn(orchestrator.run(rx));
        Harness {
            shared,
            commands,
            device,
            connector,
            task,
        }
    }

    async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
        let polled = tokio::time::timeout(Duration::from_secs(5), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(polled.is_ok(), "timed out waiting for {what}");
    }

    async fn wait_for_phase(shared: &SharedSession, phase: Phase) {
        wait_until(&format!("{phase:?}"), || lock_session(shared).phase == phase).await;
    }

    async fn ready(h: &Harness) {
        h.commands.send(SessionCommand::FetchQuestion).await.unwrap();
        wait_for_phase(&h.shared, Phase::QuestionReady).await;
    }

    // ---- tests ----

    #[tokio::test]
    async fn question_failure_sets_notice_and_stays_idle() {
        let h = harness(FakeDevice::default(), Arc::new(FailingQuestions));
        h.commands.send(SessionCommand::FetchQuestion).await.unwrap();

        wait_until("notice", || lock_session(&h.shared).notice.is_some()).await;
        let session = lock_session(&h.shared).clone();
        assert_eq!(session.phase, Phase::Idle);
        assert!(matches!(session.notice, Some(Notice::Question(_))));
    }

    #[tokio::test]
    async fn commands_outside_their_phase_are_ignored() {
        let h = harness(FakeDevice::default(), Arc::new(FixedQuestion));
        for command in [
            SessionCommand::StartRecording,
            SessionCommand::StopRecording,
            SessionCommand::ChooseFile("a.mp4".into()),
            SessionCommand::Analyze,
            SessionCommand::Restart,
        ] {
            h.commands.send(command).await.unwrap();
        }
        ready(&h).await;

        assert_eq!(h.device.acquired.load(Ordering::SeqCst), 0);
        let session = lock_session(&h.shared).clone();
        assert!(session.uploaded_file.is_none());
        assert!(session.notice.is_none());
    }

    #[tokio::test]
    async fn double_start_opens_one_stream() {
        let h = harness(FakeDevice::default(), Arc::new(FixedQuestion));
        ready(&h).await;

        h.commands.send(SessionCommand::StartRecording).await.unwrap();
        h.commands.send(SessionCommand::StartRecording).await.unwrap();
        wait_until("handshake", || h.connector.attempts.load(Ordering::SeqCst) == 1).await;
        h.connector.gate.notify_one();
        wait_for_phase(&h.shared, Phase::Recording).await;

        assert_eq!(h.device.acquired.load(Ordering::SeqCst), 1);
        assert_eq!(h.connector.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_while_connecting_cancels_and_releases() {
        let h = harness(FakeDevice::default(), Arc::new(FixedQuestion));
        ready(&h).await;

        h.commands.send(SessionCommand::StartRecording).await.unwrap();
        wait_until("handshake", || h.connector.attempts.load(Ordering::SeqCst) == 1).await;
        wait_until("connecting flag", || lock_session(&h.shared).connecting).await;
        h.commands.send(SessionCommand::StopRecording).await.unwrap();

        wait_until("release", || h.device.released.load(Ordering::SeqCst) == 1).await;
        wait_until("connecting cleared", || !lock_session(&h.shared).connecting).await;
        assert_eq!(lock_session(&h.shared).phase, Phase::QuestionReady);

        // A fresh start works after the cancelled one.
        h.commands.send(SessionCommand::StartRecording).await.unwrap();
        wait_until("second handshake", || h.connector.attempts.load(Ordering::SeqCst) == 2).await;
        h.connector.gate.notify_one();
        wait_for_phase(&h.shared, Phase::Recording).await;
    }

    #[tokio::test]
    async fn queued_completion_of_cancelled_start_is_discarded() {
        let shared = new_shared_session();
        let device = Arc::new(FakeDevice::default());
        let connector = Arc::new(GatedConnector::default());
        let mut orch = orchestrator(&shared, &device, &connector, Arc::new(FixedQuestion));
        orch.session.apply(SessionEvent::QuestionFetched("Why this role?".into()));

        // Start #1 finishes, but its result is still queued when the user
        // stops and starts again.
        orch.start_recording();
        connector.gate.notify_one();
        let first = orch.completions_rx.recv().await.unwrap();
        orch.stop_recording(StopCause::User).await;
        orch.start_recording();
        wait_until("second handshake", || connector.attempts.load(Ordering::SeqCst) == 2).await;

        orch.handle_completion(first).await;
        assert_eq!(orch.session.phase, Phase::QuestionReady);
        assert!(orch.streaming.is_none());
        assert!(orch.pending_start.is_some());
        assert_eq!(device.released.load(Ordering::SeqCst), 1);

        // Start #2 is the one that records.
        connector.gate.notify_one();
        let second = orch.completions_rx.recv().await.unwrap();
        orch.handle_completion(second).await;
        assert_eq!(orch.session.phase, Phase::Recording);
        assert!(orch.pending_start.is_none());
        assert_eq!(device.acquired.load(Ordering::SeqCst), 2);
        assert_eq!(device.released.load(Ordering::SeqCst), 1);

        orch.shutdown().await;
        assert_eq!(device.released.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn device_failure_stays_ready_without_connecting() {
        let device = FakeDevice {
            fail: Some(DeviceError::Unavailable("permission denied".into())),
            ..FakeDevice::default()
        };
        let h = harness(device, Arc::new(FixedQuestion));
        ready(&h).await;

        h.commands.send(SessionCommand::StartRecording).await.unwrap();
        wait_until("notice", || lock_session(&h.shared).notice.is_some()).await;

        let session = lock_session(&h.shared).clone();
        assert_eq!(session.phase, Phase::QuestionReady);
        assert!(matches!(session.notice, Some(Notice::Device(_))));
        assert_eq!(h.connector.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn closing_commands_releases_live_recording() {
        let h = harness(FakeDevice::default(), Arc::new(FixedQuestion));
        ready(&h).await;
        h.commands.send(SessionCommand::StartRecording).await.unwrap();
        wait_until("handshake", || h.connector.attempts.load(Ordering::SeqCst) == 1).await;
        h.connector.gate.notify_one();
        wait_for_phase(&h.shared, Phase::Recording).await;

        let Harness {
            commands,
            task,
            device,
            connector,
            ..
        } = h;
        drop(commands);
        task.await.unwrap();

        assert_eq!(device.released.load(Ordering::SeqCst), 1);
        let (mut out_rx, _in_tx) = connector.peers.lock().unwrap().pop().unwrap();
        assert_eq!(out_rx.recv().await, Some(Outbound::Close));
    }
}
