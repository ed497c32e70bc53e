//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use futures::future::{BoxFuture, FutureExt};
use tokio::sync::broadcast;

use focus_popup::{
    persistence::KeyValueStore,
    services::{AudioCue, CompletionNotifier, NotificationRequest, SystemNotifier},
    state::{AppState, TimerState, Timings, TIMER_STATE_KEY},
    utils::{Clock, TokioClock},
};

pub const T0: i64 = 1_700_000_000_000;

/// Records every notification and audio cue
#[derive(Default)]
pub struct Recording {
    pub shown: Mutex<Vec<NotificationRequest>>,
    pub plays: AtomicUsize,
}

impl Recording {
    pub fn titles(&self) -> Vec<String> {
        self.shown
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.title.clone())
            .collect()
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

impl SystemNotifier for Recording {
    fn show(&self, request: NotificationRequest) -> BoxFuture<'_, Result<(), String>> {
        self.shown.lock().unwrap().push(request);
        futures::future::ready(Ok(())).boxed()
    }
}

impl AudioCue for Recording {
    fn play(&self) -> BoxFuture<'_, Result<(), String>> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        futures::future::ready(Ok(())).boxed()
    }

    fn beep(&self) {}
}

/// Build an unmounted AppState whose clock reads `T0` at construction
pub fn build_state(store: Arc<dyn KeyValueStore>) -> (Arc<AppState>, Arc<Recording>) {
    build_state_at(store, T0)
}

/// Build an unmounted AppState whose clock reads `anchor_ms` at construction
///
/// The clock follows tokio's (paused) time, so advancing test time moves
/// the timer forward.
pub fn build_state_at(
    store: Arc<dyn KeyValueStore>,
    anchor_ms: i64,
) -> (Arc<AppState>, Arc<Recording>) {
    build_state_with_clock(store, Arc::new(TokioClock::anchored_at(anchor_ms)))
}

/// Build an unmounted AppState reading time from `clock`
pub fn build_state_with_clock(
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
) -> (Arc<AppState>, Arc<Recording>) {
    let recording = Arc::new(Recording::default());
    let (banner_tx, _) = broadcast::channel(16);
    let notifier = CompletionNotifier::new(
        recording.clone(),
        recording.clone(),
        banner_tx,
        "icon128.png".to_string(),
    );

    let state = Arc::new(AppState::new(
        store,
        notifier,
        clock,
        Timings::default(),
        0,
        "127.0.0.1".to_string(),
    ));
    (state, recording)
}

pub fn running_since(ms_before_t0: i64) -> TimerState {
    TimerState {
        is_running: true,
        last_start_time_epoch_ms: Some(T0 - ms_before_t0),
        ..TimerState::new()
    }
}

pub async fn persisted(store: &dyn KeyValueStore) -> Option<TimerState> {
    store
        .get(TIMER_STATE_KEY)
        .await
        .unwrap()
        .map(|value| serde_json::from_value(value).unwrap())
}
