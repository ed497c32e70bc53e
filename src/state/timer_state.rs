//! Persisted pomodoro timer record

use serde::{Deserialize, Serialize};

/// Store key under which the timer record lives
pub const TIMER_STATE_KEY: &str = "pomodoroState";

pub const DEFAULT_WORK_SECONDS: u32 = 30 * 60;
pub const DEFAULT_BREAK_SECONDS: u32 = 5 * 60;

pub const MIN_WORK_SECONDS: u32 = 60;
pub const MAX_WORK_SECONDS: u32 = 60 * 60;
pub const MIN_BREAK_SECONDS: u32 = 60;
pub const MAX_BREAK_SECONDS: u32 = 30 * 60;

/// Timer configuration and runtime status
///
/// This is the only mutable entity of the timer. While running,
/// `time_left_seconds` is derived from `last_start_time_epoch_ms` and is never
/// authoritative on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub time_left_seconds: u32,
    pub work_duration_seconds: u32,
    pub break_duration_seconds: u32,
    pub is_break: bool,
    pub is_running: bool,
    pub last_start_time_epoch_ms: Option<i64>,
}

impl TimerState {
    /// Create the idle, work-phase record used on first mount
    pub fn new() -> Self {
        Self {
            time_left_seconds: DEFAULT_WORK_SECONDS,
            work_duration_seconds: DEFAULT_WORK_SECONDS,
            break_duration_seconds: DEFAULT_BREAK_SECONDS,
            is_break: false,
            is_running: false,
            last_start_time_epoch_ms: None,
        }
    }

    /// Full duration of the current phase
    pub fn phase_duration_seconds(&self) -> u32 {
        if self.is_break {
            self.break_duration_seconds
        } else {
            self.work_duration_seconds
        }
    }

    /// Whole seconds elapsed since the current interval started
    ///
    /// A start timestamp in the future counts as zero elapsed.
    pub fn elapsed_seconds(&self, now_ms: i64) -> Option<u64> {
        self.last_start_time_epoch_ms
            .map(|start| (now_ms.saturating_sub(start).max(0) / 1000) as u64)
    }

    /// Remaining seconds of the current phase at `now_ms`
    pub fn remaining_seconds(&self, now_ms: i64) -> Option<u32> {
        self.elapsed_seconds(now_ms).map(|elapsed| {
            let remaining = u64::from(self.phase_duration_seconds()).saturating_sub(elapsed);
            remaining as u32
        })
    }

    /// Bring a record read from storage back inside its documented ranges
    pub fn sanitized(mut self) -> Self {
        self.work_duration_seconds = self
            .work_duration_seconds
            .clamp(MIN_WORK_SECONDS, MAX_WORK_SECONDS);
        self.break_duration_seconds = self
            .break_duration_seconds
            .clamp(MIN_BREAK_SECONDS, MAX_BREAK_SECONDS);
        self.time_left_seconds = self.time_left_seconds.min(self.phase_duration_seconds());
        if !self.is_running {
            self.last_start_time_epoch_ms = None;
        }
        self
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::new()
    }
}
