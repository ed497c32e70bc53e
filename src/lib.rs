//! Focus Popup - background runtime for a daily planner popup
//!
//! This library provides the popup's pomodoro timer: a persisted,
//! drift-corrected countdown that survives the popup being closed and
//! reopened, debounced writes to the durable store, and completion
//! notifications that fire exactly once per finished phase.

pub mod api;
pub mod config;
pub mod persistence;
pub mod services;
pub mod state;
pub mod tasks;
pub mod timer;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use state::{AppState, TimerState};
pub use utils::signals::shutdown_signal;
