//! Mount-time reconciliation of the persisted timer record

use tracing::{info, warn};

use super::engine::{Effect, TimerEngine};
use crate::state::TimerState;

/// Records whose interval started longer ago than this are abandoned
pub const STALE_AFTER_MS: i64 = 24 * 60 * 60 * 1000;

/// What recovery decided to do with the persisted record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Nothing was persisted, defaults apply
    Fresh,
    /// The record was not running and is used as-is
    Loaded,
    /// A running interval is still in progress
    Resumed { remaining_seconds: u32 },
    /// The interval finished while nobody was watching
    CompletedWhileAway,
    /// The record was implausible and has been reset
    Discarded,
}

#[derive(Debug)]
pub struct Recovered {
    pub engine: TimerEngine,
    pub outcome: RecoveryOutcome,
    pub effects: Vec<Effect>,
}

/// Reconcile a persisted record against the current time
pub fn recover(persisted: Option<TimerState>, now_ms: i64) -> Recovered {
    let Some(state) = persisted else {
        info!("No persisted timer state, starting with defaults");
        return Recovered {
            engine: TimerEngine::new(TimerState::new()),
            outcome: RecoveryOutcome::Fresh,
            effects: Vec::new(),
        };
    };

    let mut state = state.sanitized();

    if !state.is_running {
        info!("Loaded idle timer state ({}s left)", state.time_left_seconds);
        return Recovered {
            engine: TimerEngine::new(state),
            outcome: RecoveryOutcome::Loaded,
            effects: Vec::new(),
        };
    }

    let stale = match state.last_start_time_epoch_ms {
        Some(start) => now_ms.saturating_sub(start) > STALE_AFTER_MS,
        None => true,
    };
    if stale {
        warn!(
            last_start = ?state.last_start_time_epoch_ms,
            "Discarding stale running timer state"
        );
        state.is_running = false;
        state.is_break = false;
        state.last_start_time_epoch_ms = None;
        state.time_left_seconds = state.phase_duration_seconds();
        return Recovered {
            engine: TimerEngine::new(state),
            outcome: RecoveryOutcome::Discarded,
            effects: vec![Effect::Persist],
        };
    }

    let remaining = state.remaining_seconds(now_ms).unwrap_or(0);
    state.time_left_seconds = remaining;
    let mut engine = TimerEngine::new(state);

    if remaining > 0 {
        info!("Resuming running timer with {}s left", remaining);
        return Recovered {
            engine,
            outcome: RecoveryOutcome::Resumed {
                remaining_seconds: remaining,
            },
            effects: vec![Effect::StartTicking],
        };
    }

    // The user was never told about this completion, so it is announced now.
    info!("Timer completed while the popup was closed");
    let effects = engine.complete_transition(true);
    Recovered {
        engine,
        outcome: RecoveryOutcome::CompletedWhileAway,
        effects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::engine::Completion;

    const NOW: i64 = 1_700_000_000_000;

    fn running_since(ms_ago: i64) -> TimerState {
        TimerState {
            is_running: true,
            last_start_time_epoch_ms: Some(NOW - ms_ago),
            ..TimerState::new()
        }
    }

    fn notifications(effects: &[Effect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, Effect::Notify(_)))
            .count()
    }

    #[test]
    fn missing_record_yields_defaults() {
        let recovered = recover(None, NOW);
        assert_eq!(recovered.outcome, RecoveryOutcome::Fresh);
        assert_eq!(recovered.engine.state(), &TimerState::new());
        assert!(recovered.effects.is_empty());
    }

    #[test]
    fn idle_record_is_loaded_as_is() {
        let state = TimerState {
            is_break: true,
            time_left_seconds: 300,
            ..TimerState::new()
        };
        let recovered = recover(Some(state.clone()), NOW);
        assert_eq!(recovered.outcome, RecoveryOutcome::Loaded);
        assert_eq!(recovered.engine.state(), &state);
    }

    #[test]
    fn running_record_resumes_without_notification() {
        let recovered = recover(Some(running_since(10_000)), NOW);

        assert_eq!(
            recovered.outcome,
            RecoveryOutcome::Resumed {
                remaining_seconds: 1790
            }
        );
        let state = recovered.engine.state();
        assert_eq!(state.time_left_seconds, 1790);
        assert!(state.is_running);
        assert_eq!(recovered.effects, vec![Effect::StartTicking]);
    }

    #[test]
    fn expired_record_completes_and_notifies_once() {
        let recovered = recover(Some(running_since(1_800_000)), NOW);

        assert_eq!(recovered.outcome, RecoveryOutcome::CompletedWhileAway);
        let state = recovered.engine.state();
        assert!(state.is_break);
        assert!(!state.is_running);
        assert_eq!(state.time_left_seconds, 300);
        assert_eq!(notifications(&recovered.effects), 1);
        assert!(recovered.effects.contains(&Effect::Notify(Completion {
            started_at_ms: Some(NOW - 1_800_000),
            break_starting: true,
        })));
    }

    #[test]
    fn stale_record_is_discarded_silently() {
        let mut stale = running_since(90_000_000);
        stale.is_break = false;
        stale.time_left_seconds = 12;
        let recovered = recover(Some(stale), NOW);

        assert_eq!(recovered.outcome, RecoveryOutcome::Discarded);
        let state = recovered.engine.state();
        assert!(!state.is_running);
        assert!(!state.is_break);
        assert_eq!(state.time_left_seconds, 1800);
        assert_eq!(notifications(&recovered.effects), 0);
    }

    #[test]
    fn stale_break_record_returns_to_idle_work() {
        let mut stale = running_since(90_000_000);
        stale.is_break = true;
        stale.time_left_seconds = 120;
        let recovered = recover(Some(stale), NOW);

        assert_eq!(recovered.outcome, RecoveryOutcome::Discarded);
        let state = recovered.engine.state();
        assert!(!state.is_running);
        assert!(!state.is_break);
        assert_eq!(state.last_start_time_epoch_ms, None);
        assert_eq!(state.time_left_seconds, state.work_duration_seconds);
        assert_eq!(notifications(&recovered.effects), 0);
    }

    #[test]
    fn running_record_without_timestamp_is_discarded() {
        let broken = TimerState {
            is_running: true,
            ..TimerState::new()
        };
        let recovered = recover(Some(broken), NOW);
        assert_eq!(recovered.outcome, RecoveryOutcome::Discarded);
        assert!(!recovered.engine.state().is_running);
    }

    #[test]
    fn future_start_timestamp_counts_as_just_started() {
        let recovered = recover(Some(running_since(-60_000)), NOW);
        assert_eq!(
            recovered.outcome,
            RecoveryOutcome::Resumed {
                remaining_seconds: 1800
            }
        );
    }
}
