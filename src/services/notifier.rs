//! Completion notifications: system notification, audio cue, in-UI banner

use std::sync::{Arc, Mutex};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::timer::Completion;

/// How long the in-UI banner stays visible
pub const BANNER_DISPLAY_MS: u64 = 3000;

/// A system-level notification request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub requires_interaction: bool,
}

/// Transient message shown inside the popup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub message: String,
    pub display_ms: u64,
}

/// Platform notification service
pub trait SystemNotifier: Send + Sync {
    fn show(&self, request: NotificationRequest) -> BoxFuture<'_, Result<(), String>>;
}

/// Audible cue playback
pub trait AudioCue: Send + Sync {
    fn play(&self) -> BoxFuture<'_, Result<(), String>>;

    /// Last-resort sound when playback is blocked
    fn beep(&self);
}

/// Announces phase completions exactly once each
pub struct CompletionNotifier {
    system: Arc<dyn SystemNotifier>,
    audio: Arc<dyn AudioCue>,
    banner_tx: broadcast::Sender<Banner>,
    icon: String,
    last_fired: Mutex<Option<Completion>>,
}

impl std::fmt::Debug for CompletionNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionNotifier")
            .field("icon", &self.icon)
            .field("last_fired", &self.last_fired)
            .finish()
    }
}

impl CompletionNotifier {
    pub fn new(
        system: Arc<dyn SystemNotifier>,
        audio: Arc<dyn AudioCue>,
        banner_tx: broadcast::Sender<Banner>,
        icon: String,
    ) -> Self {
        Self {
            system,
            audio,
            banner_tx,
            icon,
            last_fired: Mutex::new(None),
        }
    }

    pub fn subscribe_banners(&self) -> broadcast::Receiver<Banner> {
        self.banner_tx.subscribe()
    }

    /// Fire the notification side effects for `completion`
    ///
    /// Returns `false` without doing anything if this completion was already
    /// announced. The side effects run on a spawned task; their failures are
    /// logged and never reach the caller.
    pub fn notify(&self, completion: Completion) -> bool {
        match self.last_fired.lock() {
            Ok(mut last) => {
                if *last == Some(completion) {
                    warn!("Completion {:?} already announced, skipping", completion);
                    return false;
                }
                *last = Some(completion);
            }
            Err(e) => {
                error!("Failed to lock notifier state: {}", e);
                return false;
            }
        }

        let (title, message) = messages(completion.break_starting);
        info!("Announcing completion: {}", message);

        // Nobody listening means the popup UI is not mounted; that is fine
        if self
            .banner_tx
            .send(Banner {
                message: message.to_string(),
                display_ms: BANNER_DISPLAY_MS,
            })
            .is_err()
        {
            debug!("No banner subscribers, skipping in-UI notification");
        }

        let request = NotificationRequest {
            title: title.to_string(),
            body: message.to_string(),
            icon: self.icon.clone(),
            requires_interaction: true,
        };
        let system = Arc::clone(&self.system);
        let audio = Arc::clone(&self.audio);
        tokio::spawn(async move {
            if let Err(e) = audio.play().await {
                warn!("Audio playback failed: {}, falling back to beep", e);
                audio.beep();
            }
            if let Err(e) = system.show(request).await {
                error!("Failed to show system notification: {}", e);
            }
        });

        true
    }
}

/// Notification title and message for the phase that is starting
pub fn messages(break_starting: bool) -> (&'static str, &'static str) {
    if break_starting {
        ("Break Time!", "Time for a break!")
    } else {
        ("Work Time!", "Break's over - back to work!")
    }
}

/// Desktop notifications through the platform notification daemon
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl SystemNotifier for DesktopNotifier {
    fn show(&self, request: NotificationRequest) -> BoxFuture<'_, Result<(), String>> {
        let app_name = self.app_name.clone();
        async move {
            tokio::task::spawn_blocking(move || {
                let mut notification = notify_rust::Notification::new();
                notification
                    .appname(&app_name)
                    .summary(&request.title)
                    .body(&request.body)
                    .icon(&request.icon);
                if request.requires_interaction {
                    notification.timeout(notify_rust::Timeout::Never);
                    #[cfg(all(unix, not(target_os = "macos")))]
                    notification.urgency(notify_rust::Urgency::Critical);
                }
                notification
                    .show()
                    .map(|_| ())
                    .map_err(|e| format!("Notification creation failed: {}", e))
            })
            .await
            .map_err(|e| format!("Notification task failed: {}", e))?
        }
        .boxed()
    }
}

/// Plays a sound file through the first available command-line player
#[derive(Debug, Clone)]
pub struct CommandAudioCue {
    sound_file: String,
    players: Vec<String>,
}

impl CommandAudioCue {
    pub fn new(sound_file: impl Into<String>) -> Self {
        Self {
            sound_file: sound_file.into(),
            players: vec!["paplay".to_string(), "aplay".to_string(), "afplay".to_string()],
        }
    }
}

impl AudioCue for CommandAudioCue {
    fn play(&self) -> BoxFuture<'_, Result<(), String>> {
        async move {
            if !std::path::Path::new(&self.sound_file).exists() {
                return Err(format!("Sound file {} not found", self.sound_file));
            }

            let mut last_error = String::from("no audio player configured");
            for player in &self.players {
                match tokio::process::Command::new(player)
                    .arg(&self.sound_file)
                    .stdout(std::process::Stdio::null())
                    .stderr(std::process::Stdio::null())
                    .status()
                    .await
                {
                    Ok(status) if status.success() => {
                        debug!("Played {} with {}", self.sound_file, player);
                        return Ok(());
                    }
                    Ok(status) => last_error = format!("{} exited with {}", player, status),
                    Err(e) => last_error = format!("Failed to execute {}: {}", player, e),
                }
            }
            Err(last_error)
        }
        .boxed()
    }

    fn beep(&self) {
        use std::io::Write;

        let mut stderr = std::io::stderr();
        if let Err(e) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
            warn!("Fallback beep failed: {}", e);
        }
    }
}
