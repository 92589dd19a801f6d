//! Audio cue adapter that hands the sound to an external player.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::domain::ports::{AudioCue, AudioCueError};

/// Plays the cue by spawning `player <asset>` without waiting for it.
#[derive(Debug, Clone)]
pub struct CommandAudioCue {
    player: String,
    asset: PathBuf,
}

impl CommandAudioCue {
    /// Build a cue that runs `player` on `asset`.
    pub fn new(player: impl Into<String>, asset: impl Into<PathBuf>) -> Self {
        Self {
            player: player.into(),
            asset: asset.into(),
        }
    }

    /// Sound file handed to the player.
    pub fn asset(&self) -> &Path {
        &self.asset
    }
}

#[async_trait]
impl AudioCue for CommandAudioCue {
    async fn play(&self) -> Result<(), AudioCueError> {
        if !self.asset.is_file() {
            return Err(AudioCueError::missing_asset(self.asset.display().to_string()));
        }
        let mut child = Command::new(&self.player)
            .arg(&self.asset)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|error| AudioCueError::playback(format!("{}: {error}", self.player)))?;
        let player = self.player.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {}
                Ok(status) => debug!(player = %player, %status, "audio player exited unsuccessfully"),
                Err(error) => debug!(player = %player, error = %error, "audio player wait failed"),
            }
        });
        Ok(())
    }
}
