//! Pomodoro timer module
//!
//! The pure state machine, the mount-time recovery routine, the
//! self-correcting tick schedule and the snapshot view rendered by the shell.

pub mod engine;
pub mod recovery;
pub mod schedule;
pub mod snapshot;

// Re-export main types
pub use engine::{Completion, Effect, Status, TimerEngine};
pub use recovery::{recover, Recovered, RecoveryOutcome, STALE_AFTER_MS};
pub use schedule::RepeatingTask;
pub use snapshot::{format_time, TimerSnapshot};
