//! Timer reconciliation state machine.
//!
//! The reconciler is driven by exactly one context at a time: the
//! foreground session (activate, tick, deactivate) or the wake callback
//! (background expiry). Activation cancels the pending wake once the
//! cleared alarm is on disk, before the foreground takes over.
//!
//! ## State Transitions
//!
//! ```text
//! Done -> Running           activation starts a fresh run
//! Running -> Succeeded      countdown reached zero (observed or not)
//! Running -> Done           left with the display on (streak reset),
//!                           or the wake callback fired while away
//! Succeeded -> Done         left with the display on
//! ```

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    clock::Clock,
    collaborators::{DisplayProbe, TimerSettings, WakeScheduler, WakeToken},
    error::{Result, TimerError},
    state::{
        record::{PersistedTimerRecord, STREAK_KEY},
        TimerSnapshot, TimerState,
    },
    store::PersistentStore,
};

/// Everything the reconciler talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub store: Arc<dyn PersistentStore>,
    pub scheduler: Arc<dyn WakeScheduler>,
    pub display: Arc<dyn DisplayProbe>,
    pub settings: Arc<dyn TimerSettings>,
}

/// Result of entering the foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    pub snapshot: TimerSnapshot,
    /// The countdown ran out while nothing was observing it.
    pub expired_while_away: bool,
    /// The stored record was corrupt and has been reset.
    pub recovered: bool,
}

/// Result of a single one-second tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Counting(TimerSnapshot),
    Completed(TimerSnapshot),
    /// Not foregrounded or not running; nothing changed.
    Idle(TimerSnapshot),
}

impl TickOutcome {
    pub fn snapshot(&self) -> TimerSnapshot {
        match self {
            TickOutcome::Counting(s) | TickOutcome::Completed(s) | TickOutcome::Idle(s) => *s,
        }
    }
}

/// What leaving the foreground did to the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeactivateTransition {
    /// Left early with the display on: streak reset, timer done.
    Abandoned,
    /// Display went to sleep mid-run: checkpointed, wake requested.
    Checkpointed { wake_at_epoch_seconds: i64 },
    /// Nothing running.
    Rested,
    /// Success seen and left: back to done.
    Acknowledged,
    /// Display went to sleep after success: still succeeded.
    Celebrating,
    /// Was not in the foreground to begin with.
    NotForeground,
}

#[derive(Debug)]
pub struct Deactivation {
    pub snapshot: TimerSnapshot,
    pub transition: DeactivateTransition,
    /// Non-fatal problem arranging the wake callback.
    pub warning: Option<TimerError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundExpiry {
    Completed(TimerSnapshot),
    /// The foreground owns completion detection right now.
    Foregrounded,
    /// The token does not match the pending deadline.
    Stale,
}

/// Owns the timer state machine.
pub struct TimerReconciler {
    clock: Arc<dyn Clock>,
    store: Arc<dyn PersistentStore>,
    scheduler: Arc<dyn WakeScheduler>,
    display: Arc<dyn DisplayProbe>,
    settings: Arc<dyn TimerSettings>,
    /// Refreshed from the store on every activation
    cache: Option<PersistedTimerRecord>,
    foreground: bool,
}

impl TimerReconciler {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            clock: collaborators.clock,
            store: collaborators.store,
            scheduler: collaborators.scheduler,
            display: collaborators.display,
            settings: collaborators.settings,
            cache: None,
            foreground: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_foreground(&self) -> bool {
        self.foreground
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.cache.as_ref().map(snapshot_of).unwrap_or_default()
    }

    pub fn streak(&self) -> u64 {
        self.cache.map(|r| r.streak).unwrap_or(0)
    }

    /// Deadline of the background interval recorded in the store, if one is
    /// pending. The host re-arms its scheduler with this after a restart.
    pub fn pending_wake(&self) -> Result<Option<i64>> {
        if self.foreground {
            return Ok(None);
        }
        Ok(PersistedTimerRecord::load(self.store.as_ref())?.pending_deadline())
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Enter the foreground and reconstruct what happened while away.
    pub fn on_activate(&mut self) -> Result<Activation> {
        // Already foregrounded: the cache holds ticks the store has not seen.
        if let (true, Some(record)) = (self.foreground, self.cache) {
            debug!("Already foregrounded with {}s remaining", record.seconds_remaining);
            record.save(self.store.as_ref())?;
            self.scheduler.cancel();
            return Ok(Activation {
                snapshot: snapshot_of(&record),
                expired_while_away: false,
                recovered: false,
            });
        }

        let now = self.clock.now_epoch_seconds();
        let full_length = self.configured_length_seconds();
        let (mut record, recovered) = self.load_or_recover(full_length)?;
        record.configured_length_minutes = self.configured_length_minutes();

        let mut expired_while_away = false;
        match record.state {
            TimerState::Running => {
                normalize_length(&mut record, full_length);
                let mut remaining = to_signed(record.seconds_remaining);
                if record.alarm_set_epoch_seconds > 0 {
                    let away = (now - record.alarm_set_epoch_seconds).max(0);
                    debug!("Timer was backgrounded for {}s", away);
                    remaining -= away;
                }

                if remaining <= 0 {
                    info!("Timer expired while unobserved, completing run");
                    expired_while_away = true;
                    complete_run(&mut record, full_length, TimerState::Succeeded);
                } else {
                    record.seconds_remaining = remaining.unsigned_abs();
                    debug!("Resuming timer with {}s remaining", record.seconds_remaining);
                }
            }
            TimerState::Done => {
                info!("Starting a fresh {}s run", full_length);
                start_run(&mut record, full_length);
            }
            TimerState::Succeeded => {
                normalize_length(&mut record, full_length);
                debug!("Timer still succeeded, not counting down");
            }
        }

        record.alarm_set_epoch_seconds = 0;
        record.save(self.store.as_ref())?;
        // Only once the alarm is cleared on disk.
        self.scheduler.cancel();
        self.cache = Some(record);
        self.foreground = true;

        Ok(Activation {
            snapshot: snapshot_of(&record),
            expired_while_away,
            recovered,
        })
    }

    /// Advance the foreground countdown by one second.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        let full_length = self.configured_length_seconds();
        let configured_minutes = self.configured_length_minutes();

        let running = self.cache.map_or(false, |r| r.state.is_running());
        if !self.foreground || !running {
            return Ok(TickOutcome::Idle(self.snapshot()));
        }
        let Some(record) = self.cache.as_mut() else {
            return Ok(TickOutcome::Idle(TimerSnapshot::default()));
        };

        record.seconds_remaining = record.seconds_remaining.saturating_sub(1);
        if record.seconds_remaining > 0 {
            return Ok(TickOutcome::Counting(snapshot_of(record)));
        }

        info!("Countdown reached zero in the foreground");
        record.configured_length_minutes = configured_minutes;
        complete_run(record, full_length, TimerState::Succeeded);
        record.save(self.store.as_ref())?;
        Ok(TickOutcome::Completed(snapshot_of(record)))
    }

    /// Leave the foreground, consulting the display to tell abandonment from
    /// the device going to sleep.
    pub fn on_deactivate(&mut self) -> Result<Deactivation> {
        let interactive = self.display.is_interactive();
        self.deactivate(interactive)
    }

    /// The host process is going away. Checkpoint as if the display had gone
    /// to sleep so the run survives the restart.
    pub fn on_shutdown(&mut self) -> Result<Option<Deactivation>> {
        if !self.foreground {
            return Ok(None);
        }
        self.deactivate(false).map(Some)
    }

    /// Start a new run from a resting state while foregrounded.
    pub fn start_new_run(&mut self) -> Result<TimerSnapshot> {
        let full_length = self.configured_length_seconds();
        let configured_minutes = self.configured_length_minutes();

        if !self.foreground {
            debug!("Ignoring start request outside the foreground");
            return Ok(self.snapshot());
        }
        let Some(record) = self.cache.as_mut() else {
            return Ok(TimerSnapshot::default());
        };
        if record.state.is_running() {
            return Ok(snapshot_of(record));
        }

        info!("Starting a fresh {}s run on request", full_length);
        record.configured_length_minutes = configured_minutes;
        start_run(record, full_length);
        record.save(self.store.as_ref())?;
        Ok(snapshot_of(record))
    }

    /// The wake callback fired while no foreground session was running.
    ///
    /// This path owns the completion when it gets there first: the streak is
    /// incremented here and the record rests in `Done`, so the next
    /// activation starts a fresh run without counting it again.
    pub fn on_background_expiry(&mut self, token: WakeToken) -> Result<BackgroundExpiry> {
        if self.foreground {
            debug!("Wake {} fired while foregrounded, ignoring", token.id);
            return Ok(BackgroundExpiry::Foregrounded);
        }

        let mut record = PersistedTimerRecord::load(self.store.as_ref())?;
        if record.pending_deadline() != Some(token.at_epoch_seconds) {
            debug!(
                "Wake {} for {} does not match pending deadline {:?}",
                token.id,
                token.at_epoch_seconds,
                record.pending_deadline()
            );
            return Ok(BackgroundExpiry::Stale);
        }

        info!("Timer expired in the background");
        let full_length = self.configured_length_seconds();
        record.configured_length_minutes = self.configured_length_minutes();
        complete_run(&mut record, full_length, TimerState::Done);
        record.save(self.store.as_ref())?;
        self.cache = Some(record);

        Ok(BackgroundExpiry::Completed(snapshot_of(&record)))
    }

    // ── Internals ────────────────────────────────────────────────────

    fn deactivate(&mut self, interactive: bool) -> Result<Deactivation> {
        let mut record = match (self.foreground, self.cache) {
            (true, Some(record)) => record,
            _ => {
                return Ok(Deactivation {
                    snapshot: self.snapshot(),
                    transition: DeactivateTransition::NotForeground,
                    warning: None,
                })
            }
        };
        self.foreground = false;

        let now = self.clock.now_epoch_seconds();
        let mut warning = None;

        let transition = match (record.state, interactive) {
            (TimerState::Running, true) => {
                info!(
                    "Left with {}s remaining, resetting streak of {}",
                    record.seconds_remaining, record.streak
                );
                record.streak = 0;
                record.state = TimerState::Done;
                record.seconds_remaining = 0;
                record.alarm_set_epoch_seconds = 0;
                DeactivateTransition::Abandoned
            }
            (TimerState::Running, false) => {
                let wake_at = now.saturating_add(to_signed(record.seconds_remaining));
                // Schedule before persisting the alarm time.
                if let Err(e) = self.scheduler.schedule(wake_at) {
                    warn!("Wake callback unavailable, relying on next activation: {}", e);
                    warning = Some(e);
                }
                record.alarm_set_epoch_seconds = now;
                debug!(
                    "Display asleep, checkpointed {}s with wake at {}",
                    record.seconds_remaining, wake_at
                );
                DeactivateTransition::Checkpointed {
                    wake_at_epoch_seconds: wake_at,
                }
            }
            (TimerState::Done, _) => DeactivateTransition::Rested,
            (TimerState::Succeeded, true) => {
                record.state = TimerState::Done;
                DeactivateTransition::Acknowledged
            }
            (TimerState::Succeeded, false) => DeactivateTransition::Celebrating,
        };

        record.save(self.store.as_ref())?;
        self.cache = Some(record);

        Ok(Deactivation {
            snapshot: snapshot_of(&record),
            transition,
            warning,
        })
    }

    fn load_or_recover(&self, full_length: u64) -> Result<(PersistedTimerRecord, bool)> {
        match PersistedTimerRecord::load(self.store.as_ref()) {
            Ok(record) => Ok((record, false)),
            Err(TimerError::InvalidPersistedState(ordinal)) => {
                warn!(
                    "Stored timer state ordinal {} is invalid, resetting to done",
                    ordinal
                );
                let streak = self
                    .store
                    .get(STREAK_KEY)?
                    .and_then(|v| u64::try_from(v).ok())
                    .unwrap_or(0);
                let record = PersistedTimerRecord {
                    state: TimerState::Done,
                    seconds_remaining: full_length,
                    previous_timer_length_seconds: full_length,
                    streak,
                    ..PersistedTimerRecord::default()
                };
                Ok((record, true))
            }
            Err(e) => Err(e),
        }
    }

    fn configured_length_minutes(&self) -> u32 {
        self.settings.configured_length_minutes().max(1)
    }

    fn configured_length_seconds(&self) -> u64 {
        u64::from(self.configured_length_minutes()) * 60
    }
}

/// Streak up, next run primed at the configured length.
fn complete_run(record: &mut PersistedTimerRecord, full_length: u64, rest_in: TimerState) {
    record.streak += 1;
    record.state = rest_in;
    record.previous_timer_length_seconds = full_length;
    record.seconds_remaining = full_length;
    record.alarm_set_epoch_seconds = 0;
}

fn start_run(record: &mut PersistedTimerRecord, full_length: u64) {
    record.state = TimerState::Running;
    record.previous_timer_length_seconds = full_length;
    record.seconds_remaining = full_length;
    record.alarm_set_epoch_seconds = 0;
}

/// A run resumes at the length it started with; keep remaining within it.
fn normalize_length(record: &mut PersistedTimerRecord, full_length: u64) {
    if record.previous_timer_length_seconds == 0 {
        record.previous_timer_length_seconds = full_length.max(record.seconds_remaining);
    }
    record.seconds_remaining = record
        .seconds_remaining
        .min(record.previous_timer_length_seconds);
}

fn snapshot_of(record: &PersistedTimerRecord) -> TimerSnapshot {
    TimerSnapshot {
        state: record.state,
        seconds_remaining: record.seconds_remaining,
        timer_length_seconds: record.previous_timer_length_seconds,
        streak: record.streak,
    }
}

fn to_signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
