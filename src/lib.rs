//! Streak Timer - A persistent countdown timer that survives sleep and restarts
//!
//! The core is [`TimerReconciler`], a state machine that decides on every
//! activation how much time is really left, and whether the countdown ran
//! out while nothing was watching. Around it sits a small daemon: an HTTP
//! host surface, a per-second foreground ticker, and an in-process wake
//! scheduler.

pub mod api;
pub mod clock;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod reconciler;
pub mod services;
pub mod state;
pub mod store;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborators::{DisplayProbe, FixedSettings, Renderer, TimerSettings, WakeScheduler, WakeToken};
pub use config::Config;
pub use error::{StoreError, TimerError};
pub use reconciler::{
    Activation, BackgroundExpiry, Collaborators, DeactivateTransition, Deactivation, TickOutcome,
    TimerReconciler,
};
pub use state::{AppState, PersistedTimerRecord, TimerSnapshot, TimerState};
pub use store::{FileStore, MemoryStore, PersistentStore};
pub use utils::signals::shutdown_signal;
