//! Driven port for the optional notification sound.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors raised by audio cue adapters. Callers log and discard them.
    pub enum AudioCueError {
        /// The sound asset could not be found.
        MissingAsset { path: String } => "audio cue asset not found: {path}",
        /// The platform refused or failed to play the sound.
        Playback { message: String } => "audio cue playback failed: {message}",
    }
}

/// Short sound played alongside a hire alert.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioCue: Send + Sync {
    /// Start playing the cue.
    async fn play(&self) -> Result<(), AudioCueError>;
}

/// Audio cue that never makes a sound.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAudioCue;

#[async_trait]
impl AudioCue for SilentAudioCue {
    async fn play(&self) -> Result<(), AudioCueError> {
        Ok(())
    }
}
