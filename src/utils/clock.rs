//! Time sources used for elapsed-time computation

use std::{
    fmt::Debug,
    sync::atomic::{AtomicI64, Ordering},
};
use chrono::Utc;
use tokio::time::Instant;

/// Source of "now" as milliseconds since the Unix epoch
pub trait Clock: Send + Sync + Debug {
    fn now_epoch_ms(&self) -> i64;
}

/// Wall clock, read on every call
///
/// Elapsed time keeps counting while the host is suspended, so a countdown
/// computed from these timestamps is still right after a resume. Timestamps
/// are comparable with records persisted by earlier sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now_epoch_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Epoch clock driven by tokio time
///
/// Anchored to an epoch timestamp and advanced by `tokio::time::Instant`.
/// Tokio time stops while the host sleeps, so this clock is for simulated
/// time (paused-time tests and replays), not for a live session.
#[derive(Debug)]
pub struct TokioClock {
    anchor_epoch_ms: i64,
    anchor: Instant,
}

impl TokioClock {
    pub fn anchored_at(anchor_epoch_ms: i64) -> Self {
        Self {
            anchor_epoch_ms,
            anchor: Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now_epoch_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.anchor.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.anchor_epoch_ms.saturating_add(elapsed)
    }
}

/// Manually driven clock
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_epoch_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
