//! Host services module
//!
//! This module contains the host-side integrations the daemon uses to
//! observe the machine, such as display lock and idle state.

pub mod display;

// Re-export main types
pub use display::*;
