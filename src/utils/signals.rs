//! Signal handling for graceful shutdown

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use futures::stream::StreamExt;
use tracing::{info, warn};

/// Wait for SIGTERM or SIGINT and return the signal number.
///
/// If the handler cannot be installed this never resolves, so the server
/// keeps running rather than exiting immediately.
pub async fn shutdown_signal() -> i32 {
    let mut signals = match Signals::new([SIGTERM, SIGINT]) {
        Ok(signals) => signals,
        Err(e) => {
            warn!("Failed to install signal handler: {}", e);
            return std::future::pending().await;
        }
    };

    let signal = signals.next().await.unwrap_or(SIGTERM);
    info!("Received signal: {}", signal);
    signal
}
