//! Self-correcting recurring task

use std::time::Duration;
use tokio::{
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tracing::debug;

/// Delay until the next run, given when this run was expected
///
/// `expected` is the anchor of the run that just happened. The next anchor is
/// one interval later, so lateness observed now is subtracted from the next
/// delay and cumulative error stays bounded by scheduler jitter.
pub fn next_delay(interval: Duration, expected: Instant, now: Instant) -> Duration {
    if now >= expected {
        interval.saturating_sub(now - expected)
    } else {
        interval + (expected - now)
    }
}

/// Handle to a callback re-run on a drift-corrected cadence
///
/// The task stops when the callback returns `false`, when [`cancel`] is called,
/// or when the handle is dropped.
///
/// [`cancel`]: RepeatingTask::cancel
#[derive(Debug)]
pub struct RepeatingTask {
    handle: JoinHandle<()>,
}

impl RepeatingTask {
    /// Spawn the task; the first run happens one interval from now
    pub fn spawn<F>(interval: Duration, mut callback: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut expected = Instant::now() + interval;

            loop {
                sleep_until(expected).await;
                if !callback() {
                    debug!("Repeating task finished");
                    break;
                }

                let now = Instant::now();
                if now.saturating_duration_since(expected) > interval {
                    // Fell a whole interval behind (host suspended); restart from now
                    debug!("Repeating task re-anchored after falling behind");
                    expected = now + interval;
                } else {
                    expected = now + next_delay(interval, expected, now);
                }
            }
        });

        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
