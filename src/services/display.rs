//! Display interactivity tracking

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::process::Command;
use tracing::{debug, info};

use crate::collaborators::DisplayProbe;

/// Display state as last reported by the host or by logind.
#[derive(Debug)]
pub struct SharedDisplayProbe {
    interactive: AtomicBool,
}

impl SharedDisplayProbe {
    pub fn new(interactive: bool) -> Self {
        Self {
            interactive: AtomicBool::new(interactive),
        }
    }

    pub fn set_interactive(&self, interactive: bool) {
        let previous = self.interactive.swap(interactive, Ordering::SeqCst);
        if previous != interactive {
            info!("Display interactive state changed to: {}", interactive);
        }
    }
}

impl Default for SharedDisplayProbe {
    fn default() -> Self {
        Self::new(true)
    }
}

impl DisplayProbe for SharedDisplayProbe {
    fn is_interactive(&self) -> bool {
        self.interactive.load(Ordering::SeqCst)
    }
}

/// Ask logind whether a session is locked or idle.
///
/// Returns `true` when the session is neither locked nor idle.
pub async fn query_session_interactive(session: &str) -> Result<bool, String> {
    debug!("Querying logind for session {}", session);

    let output = Command::new("loginctl")
        .args(["show-session", session, "-p", "LockedHint", "-p", "IdleHint"])
        .output()
        .await
        .map_err(|e| format!("Failed to execute loginctl: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("loginctl show-session failed: {}", stderr));
    }

    Ok(parse_session_hints(&String::from_utf8_lossy(&output.stdout)))
}

/// Refresh the probe from logind; on failure the last known value stands.
pub async fn refresh_from_logind(probe: &SharedDisplayProbe, session: &str) -> Result<(), String> {
    let interactive = query_session_interactive(session).await?;
    probe.set_interactive(interactive);
    Ok(())
}

/// Check if loginctl is available on the system
pub async fn check_loginctl_available() -> Result<(), String> {
    Command::new("loginctl")
        .arg("--version")
        .output()
        .await
        .map_err(|_| "loginctl is not available; display state must be reported over HTTP".to_string())?;

    info!("loginctl is available");
    Ok(())
}

fn parse_session_hints(output: &str) -> bool {
    let hint = |name: &str| {
        output
            .lines()
            .filter_map(|line| line.split_once('='))
            .any(|(key, value)| key.trim() == name && value.trim() == "yes")
    };
    !hint("LockedHint") && !hint("IdleHint")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlocked_active_session_is_interactive() {
        assert!(parse_session_hints("LockedHint=no\nIdleHint=no\n"));
    }

    #[test]
    fn locked_or_idle_session_is_not_interactive() {
        assert!(!parse_session_hints("LockedHint=yes\nIdleHint=no\n"));
        assert!(!parse_session_hints("LockedHint=no\nIdleHint=yes\n"));
    }

    #[test]
    fn shared_display_reports_last_value() {
        let probe = SharedDisplayProbe::default();
        assert!(probe.is_interactive());
        probe.set_interactive(false);
        assert!(!probe.is_interactive());
    }
}
