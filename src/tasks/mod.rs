//! Background tasks module
//!
//! This module contains background tasks that run alongside the HTTP server.

pub mod foreground_ticker;
pub mod wake_callback;

// Re-export main functions
pub use foreground_ticker::foreground_ticker_task;
pub use wake_callback::{wake_callback_task, TokioWakeScheduler};
