//! State management module
//!
//! This module contains the persisted timer record and the application state
//! that owns the single authoritative in-memory copy of it.

pub mod app_state;
pub mod timer_state;

// Re-export main types
pub use app_state::{AppState, Timings};
pub use timer_state::{TimerState, TIMER_STATE_KEY};
