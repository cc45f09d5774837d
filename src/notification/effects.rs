//! Side effects triggered when a notification is admitted.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use thiserror::Error;

use crate::config::SoundConfig;

use super::types::{Notification, SoundCue};

/// Errors raised while playing a sound cue
#[derive(Debug, Error)]
pub enum SoundError {
    #[error("Sound asset not found: {0}")]
    AssetNotFound(PathBuf),

    #[error("Failed to start player `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Plays audio cues. Implementations must not block on playback.
pub trait SoundPlayer: Send + Sync {
    fn play(&self, cue: &SoundCue) -> Result<(), SoundError>;
}

/// Hook for email delivery of admitted notifications
pub trait EmailHook: Send + Sync {
    fn dispatch(&self, notification: &Notification);
}

/// Resolves cues under an assets directory and hands them to an external player
pub struct CommandSoundPlayer {
    assets_dir: PathBuf,
    command: String,
}

impl CommandSoundPlayer {
    pub fn new(assets_dir: impl Into<PathBuf>, command: impl Into<String>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            command: command.into(),
        }
    }

    /// Resolve `<assets_dir>/sounds/<cue>.mp3`
    pub fn resolve(&self, cue: &SoundCue) -> PathBuf {
        self.assets_dir.join(cue.asset_path())
    }

    fn spawn(&self, path: &Path) -> Result<(), SoundError> {
        let mut child = Command::new(&self.command)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SoundError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        // Reap the player in the background
        let command = self.command.clone();
        std::thread::spawn(move || match child.wait() {
            Ok(status) if !status.success() => {
                tracing::warn!(command = %command, status = %status, "Sound player exited with failure");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(command = %command, error = %e, "Failed to wait for sound player");
            }
        });

        Ok(())
    }
}

impl SoundPlayer for CommandSoundPlayer {
    fn play(&self, cue: &SoundCue) -> Result<(), SoundError> {
        let path = self.resolve(cue);
        if !path.is_file() {
            return Err(SoundError::AssetNotFound(path));
        }

        tracing::debug!(cue = %cue, path = %path.display(), "Playing sound cue");
        self.spawn(&path)
    }
}

/// Player for hosts without audio output
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSoundPlayer;

impl SoundPlayer for SilentSoundPlayer {
    fn play(&self, cue: &SoundCue) -> Result<(), SoundError> {
        tracing::trace!(cue = %cue, "Sound output disabled, skipping cue");
        Ok(())
    }
}

/// Email delivery is not wired up yet; admitted notifications are only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeferredEmailHook;

impl EmailHook for DeferredEmailHook {
    fn dispatch(&self, notification: &Notification) {
        tracing::debug!(
            notification_id = %notification.id,
            category = %notification.category,
            "Email delivery requested (deferred)"
        );
    }
}

/// Side-effect collaborators used by the store
#[derive(Clone)]
pub struct Effects {
    pub sound: Arc<dyn SoundPlayer>,
    pub email: Arc<dyn EmailHook>,
}

impl Effects {
    pub fn new(sound: Arc<dyn SoundPlayer>, email: Arc<dyn EmailHook>) -> Self {
        Self { sound, email }
    }

    /// No audio and a deferred email hook
    pub fn silent() -> Self {
        Self::new(Arc::new(SilentSoundPlayer), Arc::new(DeferredEmailHook))
    }

    /// Build effects from configuration
    pub fn from_config(config: &SoundConfig) -> Self {
        let sound: Arc<dyn SoundPlayer> = if config.enabled {
            tracing::info!(
                assets_dir = %config.assets_dir,
                command = %config.command,
                "Sound playback enabled"
            );
            Arc::new(CommandSoundPlayer::new(&config.assets_dir, &config.command))
        } else {
            Arc::new(SilentSoundPlayer)
        };

        Self::new(sound, Arc::new(DeferredEmailHook))
    }

    /// Play a cue, logging any failure
    pub(crate) fn play_sound(&self, cue: &SoundCue) {
        if let Err(e) = self.sound.play(cue) {
            crate::metrics::SOUND_FAILURES_TOTAL.inc();
            tracing::warn!(cue = %cue, error = %e, "Failed to play notification sound");
        }
    }
}

impl Default for Effects {
    fn default() -> Self {
        Self::silent()
    }
}
