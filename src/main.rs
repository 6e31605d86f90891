//! Application entry point — Interview Coach.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (defaults on first run).
//! 3. Create the tokio runtime.
//! 4. Build the service clients and the cpal microphone device.
//! 5. Spawn the session orchestrator on the runtime.
//! 6. Run [`eframe::run_native`] — blocks the main thread until the window
//!    is closed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use eframe::egui;
use tokio::sync::mpsc;

use interview_coach::{
    app::CoachApp,
    capture::CpalDevice,
    config::AppConfig,
    protocol::{ServiceClient, StreamConfig, WsConnector},
    session::{new_shared_session, SessionCommand, SessionOrchestrator, Services},
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let (width, height) = config.ui.window_size;
    let mut vp = egui::ViewportBuilder::default()
        .with_title("Interview Coach")
        .with_inner_size([width, height])
        .with_min_inner_size([360.0, 320.0])
        .with_drag_and_drop(true);

    if config.ui.always_on_top {
        vp = vp.with_always_on_top();
    }

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Interview Coach starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    log::info!(
        "analysis service: {} (stream {})",
        config.service.base_url,
        config.service.stream_url
    );

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Collaborators
    let client = Arc::new(ServiceClient::from_config(&config.service));
    let services = Services {
        device: Arc::new(CpalDevice::from_config(&config.capture)),
        connector: Arc::new(WsConnector::new(
            config.service.stream_url.clone(),
            config.service.connect_timeout(),
        )),
        questions: client.clone(),
        analyzer: client,
    };

    // 5. Orchestrator
    let shared = new_shared_session();
    let (command_tx, command_rx) = mpsc::channel::<SessionCommand>(16);
    let orchestrator = SessionOrchestrator::new(
        Arc::clone(&shared),
        services,
        StreamConfig::from_config(&config.capture),
    );
    let orchestrator_task = rt.spawn(orchestrator.run(command_rx));

    // 6. UI (blocks until the window is closed)
    let app = CoachApp::new(shared, command_tx);
    let result = eframe::run_native(
        "Interview Coach",
        native_options(&config),
        Box::new(move |_cc| Ok(Box::new(app))),
    );

    // The app (and with it the command sender) is gone; let the orchestrator
    // release the microphone and close any open stream.
    match rt.block_on(tokio::time::timeout(SHUTDOWN_GRACE, orchestrator_task)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::error!("orchestrator task failed: {e}"),
        Err(_) => log::warn!("orchestrator did not shut down in time"),
    }

    result.map_err(|e| anyhow::anyhow!("UI error: {e}"))
}
