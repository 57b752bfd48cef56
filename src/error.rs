use thiserror::Error;

use crate::audio_system::PlaybackId;

/// Playback errors using thiserror for structured error handling.
///
/// Sound effect failures are only ever logged; long-form failures are handed
/// back to the caller of `play_sound`. Neither kind is allowed to unwind
/// through a notification callback.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Sound effect not loaded: {0}")]
    EffectNotLoaded(String),

    #[error("Sound effect pool is closed, cannot play '{0}'")]
    PoolUnavailable(String),

    #[error("Failed to prepare '{identifier}': {reason}")]
    PreparationFailed { identifier: String, reason: String },

    #[error("Playback {0} was stopped before it started")]
    Stopped(PlaybackId),

    #[error("Timed out waiting for playback {0} to start")]
    PrepareTimeout(PlaybackId),

    #[error("Failed to open audio source {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to initialize audio output")]
    Output(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to decode sound effect")]
    DecodeFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to release audio resource: {0}")]
    ReleaseFailed(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("I/O failure on {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Reference lookup failed for {name}: {reason}")]
    Lookup { name: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to create config directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl AudioError {
    /// Map an I/O failure opening `path`, treating a missing file as an unresolvable asset
    pub(crate) fn from_open(identifier: &str, path: &std::path::Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            AudioError::AssetNotFound(identifier.to_string())
        } else {
            AudioError::Io {
                path: path.display().to_string(),
                source: err,
            }
        }
    }
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;
