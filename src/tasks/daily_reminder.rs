//! Daily reminder background task

use std::{sync::Arc, time::Duration};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::services::{NotificationRequest, SystemNotifier};

pub const REMINDER_TITLE: &str = "Daily Planner Reminder";
pub const REMINDER_MESSAGE: &str = "Don't forget to check your tasks for today!";

/// Background task that periodically reminds the user to check their tasks
///
/// The first reminder fires one full period after startup.
pub async fn daily_reminder_task(notifier: Arc<dyn SystemNotifier>, period: Duration, icon: String) {
    info!("Starting daily reminder task (every {:?})", period);

    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        info!("Sending daily reminder");
        let request = NotificationRequest {
            title: REMINDER_TITLE.to_string(),
            body: REMINDER_MESSAGE.to_string(),
            icon: icon.clone(),
            requires_interaction: false,
        };
        if let Err(e) = notifier.show(request).await {
            warn!("Failed to show daily reminder: {}", e);
        }
    }
}
