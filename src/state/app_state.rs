//! Main application state management

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info};

use crate::{
    persistence::{gate, load_timer_state, KeyValueStore, PersistenceGate},
    services::{Banner, CompletionNotifier},
    timer::{recover, Effect, RecoveryOutcome, RepeatingTask, TimerEngine, TimerSnapshot},
    utils::Clock,
};
use super::TimerState;

/// Cadences used by the timer subsystem
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub tick_interval: Duration,
    pub debounce: Duration,
    pub max_wait: Duration,
    pub retry_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1000),
            debounce: gate::DEFAULT_DEBOUNCE,
            max_wait: gate::DEFAULT_MAX_WAIT,
            retry_delay: gate::DEFAULT_RETRY_DELAY,
        }
    }
}

/// Main application state: the single owner of the in-memory timer record
///
/// Every mutation of the record takes the engine lock and carries out its
/// effects before releasing it, so writes reach the persistence gate in the
/// same order as the mutations that produced them.
pub struct AppState {
    engine: Mutex<TimerEngine>,
    ticker: Mutex<Option<RepeatingTask>>,
    /// Durable store shared with the shell's own records
    pub store: Arc<dyn KeyValueStore>,
    gate: PersistenceGate,
    notifier: CompletionNotifier,
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
    /// Snapshot published after every tick and every mutation
    pub timer_update_tx: watch::Sender<TimerSnapshot>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Mutex<Option<String>>,
    pub last_action_time: Mutex<Option<DateTime<Utc>>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("engine", &self.engine)
            .field("gate", &self.gate)
            .field("notifier", &self.notifier)
            .field("clock", &self.clock)
            .field("port", &self.port)
            .field("host", &self.host)
            .finish()
    }
}

impl AppState {
    /// Create an unmounted AppState holding the default timer record
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        notifier: CompletionNotifier,
        clock: Arc<dyn Clock>,
        timings: Timings,
        port: u16,
        host: String,
    ) -> Self {
        let engine = TimerEngine::new(TimerState::new());
        let (timer_update_tx, _) = watch::channel(TimerSnapshot::from_engine(&engine));

        Self {
            engine: Mutex::new(engine),
            ticker: Mutex::new(None),
            gate: PersistenceGate::new(
                Arc::clone(&store),
                timings.debounce,
                timings.max_wait,
                timings.retry_delay,
            ),
            store,
            notifier,
            clock,
            tick_interval: timings.tick_interval,
            timer_update_tx,
            start_time: Instant::now(),
            port,
            host,
            last_action: Mutex::new(None),
            last_action_time: Mutex::new(None),
        }
    }

    /// Reconcile the persisted record with the current time
    ///
    /// Runs once per mount, before the shell renders any timer state.
    pub async fn mount(self: &Arc<Self>) -> Result<RecoveryOutcome, String> {
        let persisted = load_timer_state(self.store.as_ref()).await;
        let recovered = recover(persisted, self.clock.now_epoch_ms());
        info!("Timer recovery outcome: {:?}", recovered.outcome);

        let mut engine = self.lock_engine()?;
        *engine = recovered.engine;
        self.apply_effects(&engine, recovered.effects);
        Ok(recovered.outcome)
    }

    /// Start counting down the current phase
    pub fn start_timer(self: &Arc<Self>) -> Result<TimerSnapshot, String> {
        // Capture the timestamp before anything else can observe the state
        let now = self.clock.now_epoch_ms();
        self.mutate("start", |engine| engine.start(now))
    }

    /// Return to an idle work phase
    pub fn reset_timer(self: &Arc<Self>) -> Result<TimerSnapshot, String> {
        self.mutate("reset", TimerEngine::reset)
    }

    /// Change phase durations, in minutes
    pub fn apply_settings(
        self: &Arc<Self>,
        work_minutes: u32,
        break_minutes: u32,
    ) -> Result<TimerSnapshot, String> {
        info!("Applying timer settings: work={}min, break={}min", work_minutes, break_minutes);
        self.mutate("settings", |engine| engine.apply_settings(work_minutes, break_minutes))
    }

    /// Current timer snapshot
    pub fn snapshot(&self) -> Result<TimerSnapshot, String> {
        self.lock_engine().map(|engine| TimerSnapshot::from_engine(&engine))
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<TimerSnapshot> {
        self.timer_update_tx.subscribe()
    }

    pub fn subscribe_banners(&self) -> broadcast::Receiver<Banner> {
        self.notifier.subscribe_banners()
    }

    /// Whether the recurring tick task is alive
    pub fn is_ticking(&self) -> bool {
        self.ticker
            .lock()
            .map(|ticker| ticker.as_ref().is_some_and(|t| !t.is_finished()))
            .unwrap_or(false)
    }

    /// Stop ticking and write out any debounced state
    pub async fn teardown(&self) {
        info!("Tearing down timer");
        self.stop_ticking();
        self.gate.flush().await;
    }

    /// Re-evaluate the countdown; returns whether ticking should continue
    fn handle_tick(self: &Arc<Self>) -> bool {
        let now = self.clock.now_epoch_ms();
        let mut engine = match self.lock_engine() {
            Ok(engine) => engine,
            Err(e) => {
                error!("{}", e);
                return false;
            }
        };

        let effects = engine.tick(now);
        debug!("Tick: {}s left", engine.state().time_left_seconds);
        self.apply_effects(&engine, effects);
        engine.state().is_running
    }

    fn mutate<F>(self: &Arc<Self>, action: &str, op: F) -> Result<TimerSnapshot, String>
    where
        F: FnOnce(&mut TimerEngine) -> Vec<Effect>,
    {
        let mut engine = self.lock_engine()?;
        let effects = op(&mut *engine);
        debug!("Action '{}' produced effects {:?}", action, effects);
        self.apply_effects(&engine, effects);
        let snapshot = TimerSnapshot::from_engine(&engine);
        drop(engine);

        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }

        Ok(snapshot)
    }

    /// Carry out engine effects; the caller holds the engine lock
    fn apply_effects(self: &Arc<Self>, engine: &TimerEngine, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Persist => self.gate.schedule(engine.state().clone()),
                Effect::StartTicking => self.start_ticking(),
                Effect::StopTicking => self.stop_ticking(),
                Effect::Notify(completion) => {
                    self.notifier.notify(completion);
                }
            }
        }
        self.timer_update_tx.send_replace(TimerSnapshot::from_engine(engine));
    }

    fn start_ticking(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let task = RepeatingTask::spawn(self.tick_interval, move || {
            weak.upgrade().is_some_and(|state| state.handle_tick())
        });

        match self.ticker.lock() {
            Ok(mut ticker) => {
                if let Some(previous) = ticker.replace(task) {
                    previous.cancel();
                }
            }
            Err(e) => error!("Failed to lock tick task: {}", e),
        }
    }

    fn stop_ticking(&self) {
        match self.ticker.lock() {
            Ok(mut ticker) => {
                if let Some(task) = ticker.take() {
                    task.cancel();
                    debug!("Tick task cancelled");
                }
            }
            Err(e) => error!("Failed to lock tick task: {}", e),
        }
    }

    fn lock_engine(&self) -> Result<MutexGuard<'_, TimerEngine>, String> {
        self.engine
            .lock()
            .map_err(|e| format!("Failed to lock timer engine: {}", e))
    }

    /// Calculate uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}
