//! Pomodoro timer state machine
//!
//! The engine is pure: each operation takes the current time as an argument,
//! mutates the in-memory [`TimerState`] and returns the side effects the caller
//! must carry out. It never touches storage, notifications or timers itself.
//!
//! ```text
//! Idle(work) --start--> RunningWork --0s--> Completed --> Idle(break)
//! Idle(break) --start--> RunningBreak --0s--> Completed --> Idle(work)
//! any --reset--> Idle(work)
//! ```

use tracing::debug;

use crate::state::TimerState;

/// Side effect requested by an engine operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Hand the current state to the persistence gate
    Persist,
    /// Begin re-evaluating the countdown on a recurring schedule
    StartTicking,
    /// Cancel the recurring schedule
    StopTicking,
    /// Tell the user a phase finished
    Notify(Completion),
}

/// A single completion transition
///
/// `started_at_ms` is the start timestamp of the interval that just finished.
/// It identifies the transition, so the notifier can refuse to announce the
/// same completion twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub started_at_ms: Option<i64>,
    pub break_starting: bool,
}

/// Derived engine status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    RunningWork,
    RunningBreak,
}

#[derive(Debug, Clone)]
pub struct TimerEngine {
    state: TimerState,
}

impl TimerEngine {
    pub fn new(state: TimerState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn status(&self) -> Status {
        match (self.state.is_running, self.state.is_break) {
            (false, _) => Status::Idle,
            (true, false) => Status::RunningWork,
            (true, true) => Status::RunningBreak,
        }
    }

    /// Start counting down the current phase
    ///
    /// No-op if already running, so a double start never schedules the
    /// countdown twice.
    pub fn start(&mut self, now_ms: i64) -> Vec<Effect> {
        if self.state.is_running {
            debug!("Start ignored, timer already running");
            return Vec::new();
        }

        self.state.is_running = true;
        self.state.last_start_time_epoch_ms = Some(now_ms);
        self.state.time_left_seconds = self.state.phase_duration_seconds();
        vec![Effect::StartTicking, Effect::Persist]
    }

    /// Re-evaluate the countdown from the absolute start timestamp
    pub fn tick(&mut self, now_ms: i64) -> Vec<Effect> {
        if !self.state.is_running {
            return vec![Effect::StopTicking];
        }

        let Some(remaining) = self.state.remaining_seconds(now_ms) else {
            // Running without a start timestamp cannot be evaluated
            self.state.is_running = false;
            self.state.time_left_seconds = self.state.phase_duration_seconds();
            return vec![Effect::StopTicking, Effect::Persist];
        };

        self.state.time_left_seconds = remaining;
        if remaining > 0 {
            vec![Effect::Persist]
        } else {
            self.complete_transition(true)
        }
    }

    /// Flip to the opposite phase and stop
    ///
    /// Only a transition of a live interval produces a notification.
    pub fn complete_transition(&mut self, was_running: bool) -> Vec<Effect> {
        let started_at_ms = self.state.last_start_time_epoch_ms;

        self.state.is_running = false;
        self.state.is_break = !self.state.is_break;
        self.state.time_left_seconds = self.state.phase_duration_seconds();
        self.state.last_start_time_epoch_ms = None;

        let mut effects = vec![Effect::StopTicking, Effect::Persist];
        if was_running {
            effects.push(Effect::Notify(Completion {
                started_at_ms,
                break_starting: self.state.is_break,
            }));
        }
        effects
    }

    /// Force back to an idle work phase with the full work duration
    pub fn reset(&mut self) -> Vec<Effect> {
        self.state.is_running = false;
        self.state.is_break = false;
        self.state.time_left_seconds = self.state.work_duration_seconds;
        self.state.last_start_time_epoch_ms = None;
        vec![Effect::StopTicking, Effect::Persist]
    }

    /// Change phase durations, given in minutes
    ///
    /// Work is clamped to 1..=60 minutes and break to 1..=30 minutes. When the
    /// timer is idle the remaining time follows the new duration of the
    /// current phase.
    pub fn apply_settings(&mut self, work_minutes: u32, break_minutes: u32) -> Vec<Effect> {
        self.state.work_duration_seconds = work_minutes.clamp(1, 60) * 60;
        self.state.break_duration_seconds = break_minutes.clamp(1, 30) * 60;

        if !self.state.is_running {
            self.state.time_left_seconds = self.state.phase_duration_seconds();
        }
        vec![Effect::Persist]
    }
}
