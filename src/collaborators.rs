//! Traits for the pieces the reconciler consumes but does not implement

use tokio::sync::watch;

use crate::{
    error::TimerError,
    state::{record::DEFAULT_TIMER_LENGTH_MINUTES, TimerSnapshot},
};

/// Handle for one scheduled wake callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeToken {
    pub id: u64,
    pub at_epoch_seconds: i64,
}

/// Arranges a one-shot callback at an absolute time. At most one callback
/// is outstanding: scheduling replaces any pending one.
pub trait WakeScheduler: Send + Sync {
    fn schedule(&self, at_epoch_seconds: i64) -> Result<WakeToken, TimerError>;

    fn cancel(&self);
}

/// Whether the display is on and unlocked. Leaving the app with an
/// interactive display counts as abandoning the timer.
pub trait DisplayProbe: Send + Sync {
    fn is_interactive(&self) -> bool;
}

/// Consumes snapshots for presentation.
pub trait Renderer: Send + Sync {
    fn render(&self, snapshot: &TimerSnapshot);
}

impl Renderer for watch::Sender<TimerSnapshot> {
    fn render(&self, snapshot: &TimerSnapshot) {
        self.send_replace(*snapshot);
    }
}

/// Source of the duration used for new timers.
pub trait TimerSettings: Send + Sync {
    fn configured_length_minutes(&self) -> u32;
}

/// A fixed timer length.
#[derive(Debug, Clone, Copy)]
pub struct FixedSettings {
    pub length_minutes: u32,
}

impl Default for FixedSettings {
    fn default() -> Self {
        Self {
            length_minutes: DEFAULT_TIMER_LENGTH_MINUTES,
        }
    }
}

impl TimerSettings for FixedSettings {
    fn configured_length_minutes(&self) -> u32 {
        self.length_minutes
    }
}
