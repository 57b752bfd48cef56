//! Audio system module
//!
//! Two independent playback paths:
//! - Sound effects: preloaded at open, triggered by name with no I/O
//! - Long-form sounds: resolved from one of three tiers, prepared
//!   asynchronously, tracked by playback id until they finish
//!
//! ## Architecture
//!
//! ```text
//! SoundManager
//!   ├── SoundEffectPool ── EffectMixer          (fire-and-forget)
//!   └── PlaybackController
//!         ├── RedirectPolicy  (pop.mp3 → pool)
//!         ├── AssetResolver   (absolute │ bundled │ private)
//!         ├── IdAllocator
//!         └── ActiveSoundRegistry
//!               └── id → MediaPlayer + SourceRelease
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use soundstage::{AudioConfig, SoundManager};
//!
//! let manager = SoundManager::with_rodio(AudioConfig::default())?;
//!
//! // Preloaded effect
//! manager.play_sound_effect("cut.mp3");
//!
//! // Long-form sound, returns once playback has started
//! let id = manager.play_sound("samples/dog.mp3")?;
//! let ms = manager.sound_duration(id);
//! manager.stop_sound(id);
//! ```

pub mod controller;
pub mod effect_pool;
pub mod manager;
pub mod player;
pub mod registry;
pub mod resolver;
pub mod source;
pub mod state;

// Re-export commonly used types
pub use controller::{PendingPlayback, PlaybackController, RedirectPolicy};
pub use effect_pool::{EffectHandle, EffectManifest, EffectMixer, ManifestEntry, SoundEffectPool};
pub use manager::SoundManager;
pub use player::{MediaBackend, MediaPlayer, PlayerEvents};
pub use registry::{ActivePlayback, ActiveSoundRegistry, IdAllocator, PlaybackId, Teardown};
pub use resolver::{AssetBundle, AssetFd, AssetResolver, DirectoryBundle};
pub use source::{AssetLocation, SourceHandle, SourceReader, SourceRelease};
pub use state::PlaybackState;
