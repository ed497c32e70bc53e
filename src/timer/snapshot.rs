//! View of the timer handed to the popup shell for rendering

use serde::{Deserialize, Serialize};

use super::engine::{Status, TimerEngine};
use crate::state::TimerState;

/// Timer record plus the text the shell drops into its mount points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    #[serde(flatten)]
    pub state: TimerState,
    /// Countdown display, "MM:SS"
    pub display: String,
    /// Phase status label
    pub phase_label: String,
    /// Whether the start control should be shown
    pub show_start: bool,
}

impl TimerSnapshot {
    pub fn from_engine(engine: &TimerEngine) -> Self {
        let state = engine.state().clone();
        Self {
            display: format_time(state.time_left_seconds),
            phase_label: phase_label(state.is_break).to_string(),
            show_start: engine.status() == Status::Idle,
            state,
        }
    }
}

/// Format seconds as zero-padded "MM:SS"
pub fn format_time(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

pub fn phase_label(is_break: bool) -> &'static str {
    if is_break { "Break" } else { "Focus" }
}
