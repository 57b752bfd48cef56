//! Sound playback and asset resolution.
//!
//! Preloaded sound effects for instant feedback, plus long-form sounds that
//! are located across bundled assets, app-private files and absolute paths,
//! prepared asynchronously and torn down exactly once.

pub mod audio_system;
pub mod backend;
pub mod config;
pub mod error;
pub mod messaging;
pub mod storage;

pub use audio_system::{
    AssetLocation, AssetResolver, PendingPlayback, PlaybackController, PlaybackId, SoundEffectPool,
    SoundManager,
};
pub use config::AudioConfig;
pub use error::{AppResult, AudioError, ConfigError, StorageError};
pub use messaging::{EventBus, PlaybackEvent};
