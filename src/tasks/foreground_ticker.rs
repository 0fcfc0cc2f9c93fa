//! Foreground countdown task

use std::{sync::Arc, time::Duration};
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info};

use crate::{reconciler::TickOutcome, state::AppState};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Background task that ticks the timer once per second while a foreground
/// session is live. Leaving the foreground cancels the loop between ticks.
pub async fn foreground_ticker_task(state: Arc<AppState>) {
    info!("Starting foreground ticker task");

    let mut foreground_rx = state.foreground_tx.subscribe();

    loop {
        if !*foreground_rx.borrow_and_update() {
            // Wait for the next activation
            if foreground_rx.changed().await.is_err() {
                break;
            }
            continue;
        }

        debug!("Foreground session started, ticking every second");
        let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match state.tick() {
                        Ok(TickOutcome::Completed(snapshot)) => {
                            info!("Timer completed in the foreground, streak is now {}", snapshot.streak);
                        }
                        Ok(TickOutcome::Counting(snapshot)) => {
                            debug!("Timer at {}", snapshot.countdown_label());
                        }
                        Ok(TickOutcome::Idle(_)) => {}
                        Err(e) => {
                            error!("Failed to tick timer: {}", e);
                        }
                    }
                }

                changed = foreground_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if !*foreground_rx.borrow_and_update() {
                        debug!("Foreground session ended, tick loop cancelled");
                        break;
                    }
                    // Re-activated: count whole seconds from now
                    interval.reset();
                }
            }
        }
    }

    info!("Foreground ticker stopped");
}
