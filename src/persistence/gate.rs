//! Debounced persistence of the timer record
//!
//! Every component that mutates the timer record writes through this gate.
//! Rapid updates (one per tick while running) collapse into at most one store
//! write per debounce window, and the last state handed in before a quiet
//! period is the one that lands. A burst that never goes quiet is still
//! written out once `max_wait` has passed since its first update.
//!
//! Store writes go through a single writer, one at a time. An attempt whose
//! state has been superseded by a later `schedule` is skipped, so a retry can
//! never land an older state over a newer one.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::{
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tracing::{debug, error, warn};

use super::{retry::retry_once, store::KeyValueStore};
use crate::state::{TimerState, TIMER_STATE_KEY};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(5000);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// A write still inside its debounce window
struct Pending {
    generation: u64,
    state: TimerState,
    burst_started: Instant,
    handle: JoinHandle<()>,
}

struct Inner {
    store: Arc<dyn KeyValueStore>,
    key: String,
    delay: Duration,
    max_wait: Duration,
    retry_delay: Duration,
    pending: Mutex<Option<Pending>>,
    generation: AtomicU64,
    writer: tokio::sync::Mutex<()>,
}

#[derive(Clone)]
pub struct PersistenceGate {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PersistenceGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceGate")
            .field("key", &self.inner.key)
            .field("delay", &self.inner.delay)
            .field("max_wait", &self.inner.max_wait)
            .field("retry_delay", &self.inner.retry_delay)
            .finish()
    }
}

impl PersistenceGate {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        delay: Duration,
        max_wait: Duration,
        retry_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                key: TIMER_STATE_KEY.to_string(),
                delay,
                max_wait: max_wait.max(delay),
                retry_delay,
                pending: Mutex::new(None),
                generation: AtomicU64::new(0),
                writer: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Queue `state` for writing, replacing any write still being debounced
    pub fn schedule(&self, state: TimerState) {
        let mut pending = match self.inner.pending.lock() {
            Ok(pending) => pending,
            Err(e) => {
                error!("Failed to lock pending write: {}", e);
                return;
            }
        };

        let now = Instant::now();
        let burst_started = match pending.take() {
            Some(previous) => {
                previous.handle.abort();
                debug!("Coalesced pending timer write (generation {})", previous.generation);
                previous.burst_started
            }
            None => now,
        };
        let deadline = (now + self.inner.delay).min(burst_started + self.inner.max_wait);

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            sleep_until(deadline).await;

            // Past the window: the write is committed and can no longer be replaced
            let state = match inner.pending.lock() {
                Ok(mut pending) => match pending.take() {
                    Some(p) if p.generation == generation => p.state,
                    other => {
                        *pending = other;
                        return;
                    }
                },
                Err(e) => {
                    error!("Failed to lock pending write: {}", e);
                    return;
                }
            };

            inner.write(generation, state).await;
        });

        *pending = Some(Pending {
            generation,
            state,
            burst_started,
            handle,
        });
    }

    /// Write any debounced state right away
    ///
    /// Also waits for a committed write that is still in flight, including
    /// its retry.
    pub async fn flush(&self) {
        let pending = match self.inner.pending.lock() {
            Ok(mut pending) => pending.take(),
            Err(e) => {
                error!("Failed to lock pending write: {}", e);
                return;
            }
        };

        match pending {
            Some(pending) => {
                pending.handle.abort();
                debug!("Flushing pending timer write (generation {})", pending.generation);
                self.inner.write(pending.generation, pending.state).await;
            }
            None => {
                let _writer = self.inner.writer.lock().await;
            }
        }
    }

    /// Whether a write is waiting for its debounce window to close
    pub fn has_pending(&self) -> bool {
        self.inner
            .pending
            .lock()
            .map(|pending| pending.is_some())
            .unwrap_or(false)
    }
}

impl Inner {
    fn is_superseded(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) > generation
    }

    async fn write(&self, generation: u64, state: TimerState) {
        let value = match serde_json::to_value(&state) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to encode timer state: {}", e);
                return;
            }
        };

        let _writer = self.writer.lock().await;
        let inner = self;
        let result = retry_once(self.retry_delay, move || {
            let superseded = inner.is_superseded(generation);
            let value = value.clone();
            async move {
                if superseded {
                    return Ok(false);
                }
                inner.store.set(&inner.key, value).await.map(|()| true)
            }
        })
        .await;

        match result {
            Ok(true) => debug!("Timer state persisted ({}s left)", state.time_left_seconds),
            Ok(false) => debug!("Skipped superseded timer write (generation {})", generation),
            Err(e) => warn!("Giving up on timer state write after retry: {}", e),
        }
    }
}
