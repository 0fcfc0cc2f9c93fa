//! In-process wake scheduler and the task that delivers its callbacks

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle, time::sleep};
use tracing::{debug, error, info, warn};

use crate::{
    clock::Clock,
    collaborators::{WakeScheduler, WakeToken},
    error::TimerError,
    reconciler::BackgroundExpiry,
    state::AppState,
};

/// Schedules wake callbacks as tokio sleeps. Fired tokens are delivered on a
/// channel drained by [`wake_callback_task`].
pub struct TokioWakeScheduler {
    clock: Arc<dyn Clock>,
    fired_tx: mpsc::UnboundedSender<WakeToken>,
    pending: Mutex<Option<(WakeToken, JoinHandle<()>)>>,
    next_id: AtomicU64,
}

impl TokioWakeScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> (Self, mpsc::UnboundedReceiver<WakeToken>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            clock,
            fired_tx,
            pending: Mutex::new(None),
            next_id: AtomicU64::new(1),
        };
        (scheduler, fired_rx)
    }

    /// The outstanding wake, if one is scheduled and has not fired yet.
    pub fn pending(&self) -> Option<WakeToken> {
        let pending = self.pending.lock().ok()?;
        pending
            .as_ref()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(token, _)| *token)
    }
}

impl WakeScheduler for TokioWakeScheduler {
    fn schedule(&self, at_epoch_seconds: i64) -> Result<WakeToken, TimerError> {
        let runtime = Handle::try_current()
            .map_err(|e| TimerError::Scheduling(format!("no async runtime: {}", e)))?;
        let mut pending = self.pending.lock()
            .map_err(|e| TimerError::Scheduling(format!("Failed to lock pending wake: {}", e)))?;

        if let Some((previous, handle)) = pending.take() {
            debug!("Replacing pending wake {}", previous.id);
            handle.abort();
        }

        let token = WakeToken {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            at_epoch_seconds,
        };
        let delay = (at_epoch_seconds - self.clock.now_epoch_seconds()).max(0).unsigned_abs();
        let fired_tx = self.fired_tx.clone();

        let handle = runtime.spawn(async move {
            sleep(Duration::from_secs(delay)).await;
            if fired_tx.send(token).is_err() {
                warn!("Wake {} fired but nobody is listening", token.id);
            }
        });

        info!("Scheduled wake {} in {}s", token.id, delay);
        *pending = Some((token, handle));
        Ok(token)
    }

    fn cancel(&self) {
        match self.pending.lock() {
            Ok(mut pending) => {
                if let Some((token, handle)) = pending.take() {
                    debug!("Cancelling wake {}", token.id);
                    handle.abort();
                }
            }
            Err(e) => warn!("Failed to lock pending wake for cancel: {}", e),
        }
    }
}

/// Background task that hands fired wake callbacks to the reconciler
pub async fn wake_callback_task(state: Arc<AppState>, mut fired_rx: mpsc::UnboundedReceiver<WakeToken>) {
    info!("Starting wake callback task");

    while let Some(token) = fired_rx.recv().await {
        match state.background_expiry(token) {
            Ok(BackgroundExpiry::Completed(snapshot)) => {
                info!("Wake {} completed the timer, streak is now {}", token.id, snapshot.streak);
            }
            Ok(other) => {
                debug!("Wake {} ignored: {:?}", token.id, other);
            }
            Err(e) => {
                error!("Failed to handle wake {}: {}", token.id, e);
            }
        }
    }

    info!("Wake callback channel closed");
}
