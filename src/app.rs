//! Interview coach window — egui/eframe application.
//!
//! [`CoachApp`] renders the [`SharedSession`] snapshot every frame and turns
//! button presses into [`SessionCommand`]s for the orchestrator.  It never
//! mutates the session itself.
//!
//! | Phase | Panel |
//! |-------|-------|
//! | `Idle` | hint + "New question" |
//! | `QuestionReady` | question + "New question" / "Start recording", or "Connecting…" + "Cancel" |
//! | `Recording` | elapsed timer, live preview, "Stop" |
//! | `RecordingStopped` / `UploadPending` | last preview, file picker, "Analyze" |
//! | `Analyzing` | spinner |
//! | `Analyzed` | final metrics, coaching suggestions, "Practice again" |

use std::path::PathBuf;
use std::time::{Duration, Instant};

use eframe::egui;
use tokio::sync::mpsc;

use crate::feedback::{generate_suggestions, rate_confidence, rate_pace, Rating, Severity};
use crate::metrics::Metrics;
use crate::session::{lock_session, Phase, Session, SessionCommand, SharedSession};

const GREEN: egui::Color32 = egui::Color32::from_rgb(80, 200, 120);
const AMBER: egui::Color32 = egui::Color32::from_rgb(240, 180, 60);
const RED: egui::Color32 = egui::Color32::from_rgb(255, 80, 80);
const BLUE: egui::Color32 = egui::Color32::from_rgb(68, 136, 255);
const DIM: egui::Color32 = egui::Color32::from_rgb(150, 150, 150);
const NOTICE: egui::Color32 = egui::Color32::from_rgb(255, 136, 68);

pub fn rating_color(rating: Rating) -> egui::Color32 {
    match rating {
        Rating::Good => GREEN,
        Rating::Fair => AMBER,
        Rating::Poor => RED,
    }
}

pub fn severity_color(severity: Severity) -> egui::Color32 {
    match severity {
        Severity::Success => GREEN,
        Severity::Info => BLUE,
        Severity::Warning => AMBER,
    }
}

/// Label and command of the record button while a question is showing.
fn record_action(connecting: bool) -> (&'static str, SessionCommand) {
    if connecting {
        ("Cancel", SessionCommand::StopRecording)
    } else {
        ("Start recording", SessionCommand::StartRecording)
    }
}

fn phase_color(phase: Phase) -> egui::Color32 {
    match phase {
        Phase::Recording => RED,
        Phase::Analyzing => BLUE,
        Phase::Analyzed => GREEN,
        _ => DIM,
    }
}

// ---------------------------------------------------------------------------
// CoachApp
// ---------------------------------------------------------------------------

pub struct CoachApp {
    shared: SharedSession,
    command_tx: mpsc::Sender<SessionCommand>,

    /// Path typed into the file field.
    file_input: String,
    /// Set when the orchestrator enters `Recording`.
    recording_start: Option<Instant>,
    last_phase: Phase,
}

impl CoachApp {
    pub fn new(shared: SharedSession, command_tx: mpsc::Sender<SessionCommand>) -> Self {
        Self {
            shared,
            command_tx,
            file_input: String::new(),
            recording_start: None,
            last_phase: Phase::Idle,
        }
    }

    /// Queue a command without blocking the UI thread.
    fn send(&self, command: SessionCommand) {
        if let Err(e) = self.command_tx.try_send(command) {
            log::warn!("ui: command not delivered: {e}");
        }
    }

    fn track_phase(&mut self, phase: Phase) {
        if phase != self.last_phase {
            self.recording_start = (phase == Phase::Recording).then(Instant::now);
            if phase == Phase::Idle {
                self.file_input.clear();
            }
            self.last_phase = phase;
        }
    }

    /// Forward a dropped file while a file is being asked for.
    fn take_dropped_file(&mut self, ctx: &egui::Context, phase: Phase) {
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|f| f.path.clone())
                .collect()
        });
        if !matches!(phase, Phase::RecordingStopped | Phase::UploadPending) {
            return;
        }
        if let Some(path) = dropped.into_iter().next() {
            self.file_input = path.display().to_string();
            self.send(SessionCommand::ChooseFile(path));
        }
    }

    // ── Panels ───────────────────────────────────────────────────────────

    fn draw_header(&self, ui: &mut egui::Ui, session: &Session) {
        ui.horizontal(|ui| {
            ui.heading("Interview Coach");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(
                    egui::RichText::new(session.phase.label())
                        .color(phase_color(session.phase))
                        .size(12.0),
                );
            });
        });
        if let Some(notice) = &session.notice {
            ui.add_space(4.0);
            ui.label(egui::RichText::new(notice.to_string()).color(NOTICE).size(12.0));
        }
        ui.separator();
    }

    fn draw_question(&self, ui: &mut egui::Ui, session: &Session) {
        if let Some(question) = &session.question {
            ui.label(egui::RichText::new("Question").color(DIM).size(11.0));
            ui.label(egui::RichText::new(question).size(16.0).strong());
            ui.add_space(8.0);
        }
    }

    fn draw_idle(&self, ui: &mut egui::Ui) {
        ui.label(egui::RichText::new("Get a question to start practising.").color(DIM));
        ui.add_space(8.0);
        if ui.button("New question").clicked() {
            self.send(SessionCommand::FetchQuestion);
        }
    }

    fn draw_question_ready(&self, ui: &mut egui::Ui, session: &Session) {
        let (label, command) = record_action(session.connecting);
        ui.horizontal(|ui| {
            if session.connecting {
                ui.add(egui::Spinner::new());
                ui.label(egui::RichText::new("Connecting…").color(BLUE));
            }
            if ui.button(label).clicked() {
                self.send(command);
            }
            if !session.connecting && ui.button("New question").clicked() {
                self.send(SessionCommand::FetchQuestion);
            }
        });
    }

    fn draw_recording(&self, ui: &mut egui::Ui, session: &Session) {
        let elapsed = self
            .recording_start
            .map(|t| t.elapsed().as_secs_f32())
            .unwrap_or(0.0);

        ui.horizontal(|ui| {
            ui.label(egui::RichText::new("● Recording").color(RED));
            ui.label(egui::RichText::new(format!("{elapsed:.1}s")).color(DIM));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Stop").clicked() {
                    self.send(SessionCommand::StopRecording);
                }
            });
        });
        ui.add_space(6.0);
        self.draw_preview(ui, session.preview.as_ref());
    }

    fn draw_preview(&self, ui: &mut egui::Ui, preview: Option<&Metrics>) {
        ui.label(egui::RichText::new("Live preview (not final)").color(DIM).size(11.0));
        match preview {
            Some(m) => draw_metrics(ui, m),
            None => {
                ui.label(egui::RichText::new("Waiting for the first update…").color(DIM));
            }
        }
    }

    fn draw_file_picker(&mut self, ui: &mut egui::Ui, session: &Session) {
        if session.preview.is_some() {
            self.draw_preview(ui, session.preview.as_ref());
            ui.separator();
        }

        ui.label("Choose the recording to analyse (path or drag and drop):");
        let mut choose = false;
        ui.horizontal(|ui| {
            let field = ui.add(
                egui::TextEdit::singleline(&mut self.file_input)
                    .hint_text("/path/to/answer.mp4")
                    .desired_width(300.0),
            );
            let entered = field.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            choose = ui.button("Use file").clicked() || entered;
        });
        let path = self.file_input.trim();
        if choose && !path.is_empty() {
            self.send(SessionCommand::ChooseFile(PathBuf::from(path)));
        }

        if let Some(file) = &session.uploaded_file {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new(file.display_name()).strong());
                if ui.button("Analyze").clicked() {
                    self.send(SessionCommand::Analyze);
                }
            });
        }
    }

    fn draw_analyzing(&self, ui: &mut egui::Ui, session: &Session) {
        ui.horizontal(|ui| {
            ui.add(egui::Spinner::new());
            let name = session
                .uploaded_file
                .as_ref()
                .map(|f| f.display_name())
                .unwrap_or_default();
            ui.label(egui::RichText::new(format!("Analyzing {name}…")).color(BLUE));
        });
    }

    fn draw_results(&self, ui: &mut egui::Ui, session: &Session) {
        let Some(metrics) = &session.metrics else {
            return;
        };

        draw_metrics(ui, metrics);
        ui.add_space(8.0);
        ui.label(egui::RichText::new("Coaching").strong());
        for tip in generate_suggestions(metrics) {
            ui.horizontal_wrapped(|ui| {
                ui.label(
                    egui::RichText::new(tip.title)
                        .color(severity_color(tip.severity))
                        .strong(),
                );
                ui.label(tip.message);
            });
        }

        ui.add_space(8.0);
        if ui.button("Practice again").clicked() {
            self.send(SessionCommand::Restart);
        }
    }
}

fn draw_metrics(ui: &mut egui::Ui, m: &Metrics) {
    egui::Grid::new("metrics").num_columns(2).show(ui, |ui| {
        ui.label("Pace");
        ui.label(egui::RichText::new(format!("{:.0} wpm", m.wpm)).color(rating_color(rate_pace(m.wpm))));
        ui.end_row();

        ui.label("Filler words");
        ui.label(m.fillers.to_string());
        ui.end_row();

        ui.label("Confidence");
        ui.label(
            egui::RichText::new(format!("{:.0}%", m.confidence))
                .color(rating_color(rate_confidence(m.confidence))),
        );
        ui.end_row();
    });

    if !m.transcript.is_empty() {
        ui.add_space(4.0);
        ui.label(egui::RichText::new(format!("Transcript ({} words)", m.word_count())).color(DIM).size(11.0));
        egui::ScrollArea::vertical()
            .max_height(120.0)
            .show(ui, |ui| {
                ui.label(m.transcript.as_str());
            });
    }
}

impl eframe::App for CoachApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let session = lock_session(&self.shared).clone();
        self.track_phase(session.phase);
        self.take_dropped_file(ctx, session.phase);

        // The orchestrator does not wake the UI, so keep polling the snapshot.
        let repaint = if session.phase.is_busy() || session.connecting { 100 } else { 250 };
        ctx.request_repaint_after(Duration::from_millis(repaint));

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_header(ui, &session);
            self.draw_question(ui, &session);

            match session.phase {
                Phase::Idle => self.draw_idle(ui),
                Phase::QuestionReady => self.draw_question_ready(ui, &session),
                Phase::Recording => self.draw_recording(ui, &session),
                Phase::RecordingStopped | Phase::UploadPending => {
                    self.draw_file_picker(ui, &session)
                }
                Phase::Analyzing => self.draw_analyzing(ui, &session),
                Phase::Analyzed => self.draw_results(ui, &session),
            }
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("ui: window closing");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
