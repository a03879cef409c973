use std::process::Command;

use crate::config::NotificationConfig;
use crate::store::{EndSound, Settings};

/// Fire-and-forget side channel for session-end alerts. Spawn failures
/// are logged and swallowed; nothing here may block or fail a lifecycle
/// transition.
pub struct Notifier {
    config: NotificationConfig,
}

impl Notifier {
    pub fn new(config: NotificationConfig) -> Self {
        Notifier { config }
    }

    /// Desktop notification for a finished session, honoring the user's
    /// notifications setting.
    pub fn session_ended(&self, settings: &Settings, title: &str) {
        if !settings.notifications {
            return;
        }
        let display = if title.trim().is_empty() {
            "Unnamed Session"
        } else {
            title
        };
        self.spawn(
            &self.config.command,
            &["Session Ended", &format!("{display} has ended.")],
        );
    }

    /// Play the configured end sound, if any.
    pub fn play_end_sound(&self, settings: &Settings) {
        if settings.session_end_sound == EndSound::None {
            return;
        }
        if let Some(ref command) = self.config.sound_command {
            self.spawn(command, &[settings.session_end_sound.as_str()]);
        }
    }

    fn spawn(&self, command: &str, args: &[&str]) {
        let mut cmd = Command::new(command);
        cmd.args(args);

        // Fire and forget, never block the caller
        match cmd.spawn() {
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("notification command '{}' failed: {}", command, e);
            }
        }
    }
}
