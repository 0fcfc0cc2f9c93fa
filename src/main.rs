//! Streak Timer - A persistent countdown timer that survives sleep and restarts
//!
//! This is the main entry point for the streak-timer daemon.

use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, time::interval};
use tracing::{info, warn};

use streak_timer::{
    api::create_router,
    clock::{Clock, SystemClock},
    collaborators::WakeScheduler,
    config::Config,
    reconciler::{Collaborators, TimerReconciler},
    services::{check_loginctl_available, refresh_from_logind, SharedDisplayProbe},
    state::AppState,
    store::FileStore,
    tasks::{foreground_ticker_task, wake_callback_task, TokioWakeScheduler},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("streak_timer={},tower_http=info", config.log_level()))
        .init();

    let state_file = config.state_file_path();
    info!("Starting streak-timer server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, timer={}min, state={}",
          config.host, config.port, config.timer, state_file.display());

    let store = Arc::new(FileStore::open(&state_file)?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let display = Arc::new(SharedDisplayProbe::default());
    let (scheduler, fired_rx) = TokioWakeScheduler::new(Arc::clone(&clock));
    let scheduler = Arc::new(scheduler);

    let reconciler = TimerReconciler::new(Collaborators {
        clock,
        store,
        scheduler: scheduler.clone(),
        display: display.clone(),
        settings: Arc::new(config.clone()),
    });
    let state = Arc::new(AppState::new(&config, reconciler, display));

    // Re-arm a wake left over from a previous process
    match state.pending_wake() {
        Ok(Some(at)) => {
            info!("Re-arming wake for pending background interval ending at {}", at);
            if let Err(e) = scheduler.schedule(at) {
                warn!("Failed to re-arm wake, next activation will reconcile: {}", e);
            }
        }
        Ok(None) => {}
        Err(e) => warn!("Could not read pending wake: {}", e),
    }

    let ticker_state = Arc::clone(&state);
    tokio::spawn(async move {
        foreground_ticker_task(ticker_state).await;
    });

    let wake_state = Arc::clone(&state);
    tokio::spawn(async move {
        wake_callback_task(wake_state, fired_rx).await;
    });

    // Keep display state fresh from logind if a session was given
    if let Some(session) = config.logind_session.clone() {
        if let Err(e) = check_loginctl_available().await {
            warn!("{}", e);
        } else {
            let display_state = Arc::clone(&state);
            tokio::spawn(async move {
                let mut poll = interval(Duration::from_secs(15));
                loop {
                    poll.tick().await;
                    if let Err(e) = refresh_from_logind(&display_state.display, &session).await {
                        warn!("Failed to poll display state: {}", e);
                    }
                }
            });
        }
    }

    let app = create_router(Arc::clone(&state));

    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /activate            - Enter the foreground");
    info!("  POST /deactivate          - Leave the foreground");
    info!("  POST /start               - Start a fresh run");
    info!("  POST /display/interactive - Report display on");
    info!("  POST /display/idle        - Report display off or locked");
    info!("  GET  /status              - Timer status");
    info!("  GET  /health              - Health check");

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

    match state.shutdown_checkpoint() {
        Ok(Some(deactivation)) => info!("Checkpointed timer on shutdown: {:?}", deactivation.transition),
        Ok(None) => {}
        Err(e) => tracing::error!("Failed to checkpoint timer on shutdown: {}", e),
    }

    info!("Server shutdown complete");
    Ok(())
}
