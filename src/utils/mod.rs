//! Utility functions module
//!
//! This module contains the clock abstraction and shutdown signal handling.

pub mod clock;
pub mod signals;

// Re-export main items
pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use signals::shutdown_signal;
