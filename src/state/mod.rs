//! State management module
//!
//! This module contains the timer state, its durable record, and the shared
//! daemon state that wraps the reconciler.

pub mod app_state;
pub mod record;
pub mod timer_state;

// Re-export main types
pub use app_state::AppState;
pub use record::PersistedTimerRecord;
pub use timer_state::{TimerSnapshot, TimerState};
