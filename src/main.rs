//! Focus Popup - background runtime for a daily planner popup
//!
//! This is the main entry point: process start is a popup mount and a
//! termination signal is a popup teardown.

use std::sync::Arc;
use tokio::{net::TcpListener, sync::broadcast};
use tracing::info;

use focus_popup::{
    api::create_router,
    config::Config,
    persistence::{JsonFileStore, KeyValueStore, MemoryStore},
    services::{CommandAudioCue, CompletionNotifier, DesktopNotifier, SystemNotifier},
    state::AppState,
    tasks::daily_reminder_task,
    utils::{shutdown_signal, SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("focus_popup={},tower_http=info", config.log_level()))
        .init();

    info!("Starting focus-popup v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, store={}, ephemeral={}",
          config.host, config.port, config.store.display(), config.ephemeral);

    let store: Arc<dyn KeyValueStore> = if config.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(JsonFileStore::open(&config.store, config.item_quota_bytes).await?)
    };

    let system_notifier: Arc<dyn SystemNotifier> = Arc::new(DesktopNotifier::new("focus-popup"));
    let (banner_tx, _) = broadcast::channel(16);
    let notifier = CompletionNotifier::new(
        Arc::clone(&system_notifier),
        Arc::new(CommandAudioCue::new(config.sound_file.clone())),
        banner_tx,
        config.icon.clone(),
    );

    // Create application state and reconcile the persisted timer
    let state = Arc::new(AppState::new(
        store,
        notifier,
        Arc::new(SystemClock::new()),
        config.timings(),
        config.port,
        config.host.clone(),
    ));
    state.mount().await.map_err(anyhow::Error::msg)?;

    // Start the daily reminder background task
    let reminder = tokio::spawn(daily_reminder_task(
        system_notifier,
        config.reminder_period(),
        config.icon.clone(),
    ));

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /timer          - Current timer snapshot");
    info!("  POST /timer/start    - Start the current phase");
    info!("  POST /timer/reset    - Reset to an idle focus phase");
    info!("  PUT  /timer/settings - Change focus/break minutes");
    info!("  GET  /timer/events   - Snapshot and banner event stream");
    info!("  GET  /store/:key     - Read a shell record");
    info!("  PUT  /store/:key     - Write a shell record");
    info!("  GET  /status         - Timer and runtime status");
    info!("  GET  /health         - Health check");

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    reminder.abort();
    state.teardown().await;

    info!("Shutdown complete");
    Ok(())
}
