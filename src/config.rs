//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};
use clap::Parser;

use crate::{persistence::store::DEFAULT_ITEM_QUOTA_BYTES, state::Timings};

/// CLI argument parsing structure
#[derive(Parser, Debug, Clone)]
#[command(name = "focus-popup")]
#[command(about = "Background runtime for a daily planner popup with a pomodoro timer")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Path of the durable JSON store
    #[arg(short, long, default_value = "focus-popup-store.json")]
    pub store: PathBuf,

    /// Keep state in memory only (nothing survives a restart)
    #[arg(long)]
    pub ephemeral: bool,

    /// Maximum size of a single stored item in bytes
    #[arg(long, default_value_t = DEFAULT_ITEM_QUOTA_BYTES)]
    pub item_quota_bytes: usize,

    /// Countdown re-evaluation interval in milliseconds
    #[arg(long, default_value = "1000")]
    pub tick_ms: u64,

    /// Debounce window for timer state writes in milliseconds
    #[arg(long, default_value = "1000")]
    pub debounce_ms: u64,

    /// Longest a continuously updated timer state waits before being written
    #[arg(long, default_value = "5000")]
    pub max_wait_ms: u64,

    /// Delay before retrying a failed write in milliseconds
    #[arg(long, default_value = "1000")]
    pub retry_ms: u64,

    /// Daily reminder period in minutes
    #[arg(long, default_value = "1440")]
    pub reminder_minutes: u64,

    /// Icon used for system notifications
    #[arg(long, default_value = "alarm-clock")]
    pub icon: String,

    /// Sound played when a phase completes
    #[arg(long, default_value = "/usr/share/sounds/freedesktop/stereo/complete.oga")]
    pub sound_file: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn timings(&self) -> Timings {
        Timings {
            tick_interval: Duration::from_millis(self.tick_ms.max(1)),
            debounce: Duration::from_millis(self.debounce_ms),
            max_wait: Duration::from_millis(self.max_wait_ms),
            retry_delay: Duration::from_millis(self.retry_ms),
        }
    }

    pub fn reminder_period(&self) -> Duration {
        Duration::from_secs(self.reminder_minutes.max(1) * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_popup_behaviour() {
        let config = Config::try_parse_from(["focus-popup"]).unwrap();
        assert_eq!(config.address(), "127.0.0.1:20554");
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.timings().debounce, Duration::from_secs(1));
        assert_eq!(config.timings().retry_delay, Duration::from_secs(1));
        assert_eq!(config.reminder_period(), Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.item_quota_bytes, 8192);
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "focus-popup",
            "--port",
            "9000",
            "--ephemeral",
            "--tick-ms",
            "250",
            "-v",
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.ephemeral);
        assert_eq!(config.timings().tick_interval, Duration::from_millis(250));
        assert_eq!(config.log_level(), "debug");
    }
}
