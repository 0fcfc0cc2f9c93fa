//! The single durable timer record and its store keys

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::TimerState;
use crate::{error::TimerError, store::PersistentStore};

pub const STATE_KEY: &str = "timer.state";
pub const SECONDS_REMAINING_KEY: &str = "timer.seconds_remaining";
pub const PREVIOUS_TIMER_LENGTH_SECONDS_KEY: &str = "timer.previous_timer_length_seconds";
pub const ALARM_SET_EPOCH_SECONDS_KEY: &str = "timer.alarm_set_epoch_seconds";
pub const STREAK_KEY: &str = "timer.streak";
pub const CONFIGURED_LENGTH_MINUTES_KEY: &str = "timer.configured_length_minutes";

/// Length used for new timers when nothing has been configured.
pub const DEFAULT_TIMER_LENGTH_MINUTES: u32 = 10;

/// Everything the timer needs to reconstruct itself after process death.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedTimerRecord {
    pub state: TimerState,
    pub seconds_remaining: u64,
    pub previous_timer_length_seconds: u64,
    /// 0 means no background interval is pending.
    pub alarm_set_epoch_seconds: i64,
    pub streak: u64,
    pub configured_length_minutes: u32,
}

impl Default for PersistedTimerRecord {
    /// First-run record: resting, nothing pending, no streak.
    fn default() -> Self {
        Self {
            state: TimerState::Done,
            seconds_remaining: 0,
            previous_timer_length_seconds: 0,
            alarm_set_epoch_seconds: 0,
            streak: 0,
            configured_length_minutes: DEFAULT_TIMER_LENGTH_MINUTES,
        }
    }
}

impl PersistedTimerRecord {
    /// Read the record, substituting defaults for absent keys.
    ///
    /// Fails with [`TimerError::InvalidPersistedState`] if the stored state
    /// ordinal is out of range.
    pub fn load(store: &dyn PersistentStore) -> Result<Self, TimerError> {
        let defaults = Self::default();

        let state = match store.get(STATE_KEY)? {
            Some(ordinal) => TimerState::from_ordinal(ordinal)?,
            None => defaults.state,
        };

        Ok(Self {
            state,
            seconds_remaining: read_unsigned(store, SECONDS_REMAINING_KEY)?,
            previous_timer_length_seconds: read_unsigned(store, PREVIOUS_TIMER_LENGTH_SECONDS_KEY)?,
            alarm_set_epoch_seconds: store
                .get(ALARM_SET_EPOCH_SECONDS_KEY)?
                .unwrap_or(0)
                .max(0),
            streak: read_unsigned(store, STREAK_KEY)?,
            configured_length_minutes: store
                .get(CONFIGURED_LENGTH_MINUTES_KEY)?
                .and_then(|v| u32::try_from(v).ok())
                .filter(|&v| v > 0)
                .unwrap_or(defaults.configured_length_minutes),
        })
    }

    /// Write every field in one batch.
    pub fn save(&self, store: &dyn PersistentStore) -> Result<(), TimerError> {
        store.set_many(&[
            (STATE_KEY, self.state.ordinal()),
            (SECONDS_REMAINING_KEY, to_stored(self.seconds_remaining)),
            (
                PREVIOUS_TIMER_LENGTH_SECONDS_KEY,
                to_stored(self.previous_timer_length_seconds),
            ),
            (ALARM_SET_EPOCH_SECONDS_KEY, self.alarm_set_epoch_seconds),
            (STREAK_KEY, to_stored(self.streak)),
            (
                CONFIGURED_LENGTH_MINUTES_KEY,
                i64::from(self.configured_length_minutes),
            ),
        ])?;
        Ok(())
    }

    /// Absolute deadline of the pending background interval, if any.
    pub fn pending_deadline(&self) -> Option<i64> {
        if self.state.is_running() && self.alarm_set_epoch_seconds > 0 {
            Some(
                self.alarm_set_epoch_seconds
                    .saturating_add(to_stored(self.seconds_remaining)),
            )
        } else {
            None
        }
    }
}

fn read_unsigned(store: &dyn PersistentStore, key: &str) -> Result<u64, TimerError> {
    let value = store.get(key)?.unwrap_or(0);
    Ok(u64::try_from(value).unwrap_or_else(|_| {
        warn!("Negative value {} stored under {}, treating as 0", value, key);
        0
    }))
}

fn to_stored(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn absent_keys_load_as_first_run_defaults() {
        let store = MemoryStore::new();
        let record = PersistedTimerRecord::load(&store).unwrap();
        assert_eq!(record, PersistedTimerRecord::default());
        assert_eq!(record.state, TimerState::Done);
    }

    #[test]
    fn save_then_load_reproduces_every_field() {
        let store = MemoryStore::new();
        let record = PersistedTimerRecord {
            state: TimerState::Running,
            seconds_remaining: 421,
            previous_timer_length_seconds: 600,
            alarm_set_epoch_seconds: 1_700_000_000,
            streak: 12,
            configured_length_minutes: 25,
        };
        record.save(&store).unwrap();
        assert_eq!(PersistedTimerRecord::load(&store).unwrap(), record);
    }

    #[test]
    fn corrupt_state_ordinal_fails_fast() {
        let store = MemoryStore::new();
        store.set(STATE_KEY, 7).unwrap();
        assert!(matches!(
            PersistedTimerRecord::load(&store),
            Err(TimerError::InvalidPersistedState(7))
        ));
    }

    #[test]
    fn zero_configured_length_falls_back_to_default() {
        let store = MemoryStore::new();
        store.set(CONFIGURED_LENGTH_MINUTES_KEY, 0).unwrap();
        let record = PersistedTimerRecord::load(&store).unwrap();
        assert_eq!(record.configured_length_minutes, DEFAULT_TIMER_LENGTH_MINUTES);
    }

    #[test]
    fn pending_deadline_only_while_running_with_alarm() {
        let mut record = PersistedTimerRecord {
            state: TimerState::Running,
            seconds_remaining: 100,
            alarm_set_epoch_seconds: 1_000,
            ..PersistedTimerRecord::default()
        };
        assert_eq!(record.pending_deadline(), Some(1_100));

        record.alarm_set_epoch_seconds = 0;
        assert_eq!(record.pending_deadline(), None);

        record.alarm_set_epoch_seconds = 1_000;
        record.state = TimerState::Done;
        assert_eq!(record.pending_deadline(), None);
    }

    #[test]
    fn pending_deadline_saturates_on_absurd_remaining() {
        let store = MemoryStore::new();
        store.set(STATE_KEY, TimerState::Running.ordinal()).unwrap();
        store.set(SECONDS_REMAINING_KEY, i64::MAX).unwrap();
        store.set(ALARM_SET_EPOCH_SECONDS_KEY, 1_700_000_000).unwrap();

        let record = PersistedTimerRecord::load(&store).unwrap();
        assert_eq!(record.pending_deadline(), Some(i64::MAX));
    }
}
