//! Timer state enum and the render snapshot

use serde::{Deserialize, Serialize};

use crate::error::TimerError;

/// Persisted timer state. The discriminant is the stored ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    /// Countdown active, or active when last checkpointed
    Running = 0,
    /// Completed; the user has not yet left the app interactively
    Succeeded = 1,
    /// Resting idle state
    Done = 2,
}

impl TimerState {
    pub fn ordinal(self) -> i64 {
        self as i64
    }

    /// Decode a stored ordinal, failing on anything out of range.
    pub fn from_ordinal(ordinal: i64) -> Result<Self, TimerError> {
        match ordinal {
            0 => Ok(TimerState::Running),
            1 => Ok(TimerState::Succeeded),
            2 => Ok(TimerState::Done),
            other => Err(TimerError::InvalidPersistedState(other)),
        }
    }

    pub fn is_running(self) -> bool {
        self == TimerState::Running
    }
}

/// Derived view of the timer for rendering. Never the source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub seconds_remaining: u64,
    pub timer_length_seconds: u64,
    pub streak: u64,
}

impl TimerSnapshot {
    /// Seconds already counted down in the current run.
    pub fn elapsed_seconds(&self) -> u64 {
        self.timer_length_seconds.saturating_sub(self.seconds_remaining)
    }

    /// Remaining time as `M:SS`.
    pub fn countdown_label(&self) -> String {
        format!("{}:{:02}", self.seconds_remaining / 60, self.seconds_remaining % 60)
    }
}

impl Default for TimerSnapshot {
    fn default() -> Self {
        Self {
            state: TimerState::Done,
            seconds_remaining: 0,
            timer_length_seconds: 0,
            streak: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_match_declaration_order() {
        for state in [TimerState::Running, TimerState::Succeeded, TimerState::Done] {
            assert_eq!(TimerState::from_ordinal(state.ordinal()).unwrap(), state);
        }
    }

    #[test]
    fn out_of_range_ordinal_is_rejected() {
        assert!(matches!(
            TimerState::from_ordinal(3),
            Err(TimerError::InvalidPersistedState(3))
        ));
        assert!(TimerState::from_ordinal(-1).is_err());
    }

    #[test]
    fn countdown_label_pads_seconds() {
        let snapshot = TimerSnapshot {
            state: TimerState::Running,
            seconds_remaining: 65,
            timer_length_seconds: 600,
            streak: 0,
        };
        assert_eq!(snapshot.countdown_label(), "1:05");
        assert_eq!(snapshot.elapsed_seconds(), 535);
    }
}
