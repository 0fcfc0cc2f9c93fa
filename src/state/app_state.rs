//! Shared daemon state wrapping the reconciler

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{info, warn};

use super::TimerSnapshot;
use crate::{
    collaborators::{Renderer, WakeToken},
    config::Config,
    reconciler::{Activation, BackgroundExpiry, Deactivation, TickOutcome, TimerReconciler},
    services::{refresh_from_logind, SharedDisplayProbe},
};

/// Application state shared between the HTTP handlers and background tasks
pub struct AppState {
    /// The single timer, driven by one context at a time
    pub reconciler: Mutex<TimerReconciler>,
    /// Display state consulted on deactivation
    pub display: Arc<SharedDisplayProbe>,
    pub logind_session: Option<String>,
    pub timer_length_minutes: u32,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Mutex<Option<String>>,
    pub last_action_time: Mutex<Option<DateTime<Utc>>>,
    /// Whether a foreground session is live; the ticker follows this
    pub foreground_tx: watch::Sender<bool>,
    /// Latest snapshot for renderers
    pub snapshot_tx: watch::Sender<TimerSnapshot>,
}

impl AppState {
    pub fn new(config: &Config, reconciler: TimerReconciler, display: Arc<SharedDisplayProbe>) -> Self {
        let (foreground_tx, _) = watch::channel(false);
        let (snapshot_tx, _) = watch::channel(reconciler.snapshot());

        Self {
            reconciler: Mutex::new(reconciler),
            display,
            logind_session: config.logind_session.clone(),
            timer_length_minutes: config.timer,
            start_time: Instant::now(),
            port: config.port,
            host: config.host.clone(),
            last_action: Mutex::new(None),
            last_action_time: Mutex::new(None),
            foreground_tx,
            snapshot_tx,
        }
    }

    /// Run a closure against the locked reconciler and publish the result.
    fn with_reconciler<T, F>(&self, action: &str, f: F) -> Result<T, String>
    where
        F: FnOnce(&mut TimerReconciler) -> crate::error::Result<T>,
    {
        let mut reconciler = self.reconciler.lock()
            .map_err(|e| format!("Failed to lock timer reconciler: {}", e))?;

        let result = f(&mut reconciler).map_err(|e| format!("Timer {} failed: {}", action, e))?;
        let snapshot = reconciler.snapshot();
        let foreground = reconciler.is_foreground();
        drop(reconciler);

        self.snapshot_tx.render(&snapshot);
        self.foreground_tx.send_if_modified(|current| {
            let changed = *current != foreground;
            *current = foreground;
            changed
        });

        Ok(result)
    }

    fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    /// Enter the foreground
    pub fn activate(&self) -> Result<Activation, String> {
        let activation = self.with_reconciler("activation", |r| r.on_activate())?;
        self.record_action("activate");
        // Restart the tick boundary even if we were already foregrounded.
        self.foreground_tx.send_replace(true);
        info!(
            "Activated: state={:?}, remaining={}s, streak={}",
            activation.snapshot.state, activation.snapshot.seconds_remaining, activation.snapshot.streak
        );
        Ok(activation)
    }

    /// Leave the foreground, refreshing display state from logind first if configured
    pub async fn deactivate(&self) -> Result<Deactivation, String> {
        if let Some(session) = &self.logind_session {
            if let Err(e) = refresh_from_logind(&self.display, session).await {
                warn!("Failed to refresh display state, using last known: {}", e);
            }
        }

        let deactivation = self.with_reconciler("deactivation", |r| r.on_deactivate())?;
        self.record_action("deactivate");
        info!("Deactivated: {:?}", deactivation.transition);
        Ok(deactivation)
    }

    /// Begin a fresh run from a resting state
    pub fn start_run(&self) -> Result<TimerSnapshot, String> {
        let snapshot = self.with_reconciler("start", |r| r.start_new_run())?;
        self.record_action("start");
        Ok(snapshot)
    }

    /// One foreground second has elapsed
    pub fn tick(&self) -> Result<TickOutcome, String> {
        self.with_reconciler("tick", |r| r.tick())
    }

    /// A wake callback fired
    pub fn background_expiry(&self, token: WakeToken) -> Result<BackgroundExpiry, String> {
        let expiry = self.with_reconciler("background expiry", |r| r.on_background_expiry(token))?;
        if matches!(expiry, BackgroundExpiry::Completed(_)) {
            self.record_action("background-expiry");
        }
        Ok(expiry)
    }

    /// Checkpoint before the process exits
    pub fn shutdown_checkpoint(&self) -> Result<Option<Deactivation>, String> {
        self.with_reconciler("shutdown checkpoint", |r| r.on_shutdown())
    }

    /// Deadline of a background interval left over from a previous process
    pub fn pending_wake(&self) -> Result<Option<i64>, String> {
        self.reconciler.lock()
            .map_err(|e| format!("Failed to lock timer reconciler: {}", e))?
            .pending_wake()
            .map_err(|e| format!("Failed to read pending wake: {}", e))
    }

    pub fn set_display_interactive(&self, interactive: bool) {
        self.display.set_interactive(interactive);
        self.record_action(if interactive { "display-interactive" } else { "display-idle" });
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        *self.snapshot_tx.borrow()
    }

    pub fn is_foreground(&self) -> bool {
        *self.foreground_tx.borrow()
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}
