//! Background tasks module
//!
//! This module contains background tasks that run alongside the HTTP server.

pub mod daily_reminder;

// Re-export main functions
pub use daily_reminder::daily_reminder_task;
