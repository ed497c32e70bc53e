//! External service module
//!
//! This module contains the notification side effects: system notifications,
//! the audio cue, and the in-popup banner.

pub mod notifier;

// Re-export main types
pub use notifier::{
    AudioCue, Banner, CommandAudioCue, CompletionNotifier, DesktopNotifier, NotificationRequest,
    SystemNotifier,
};
