//! Playback backends
//!
//! Implementations of [`EffectMixer`](crate::audio_system::EffectMixer) and
//! [`MediaBackend`](crate::audio_system::MediaBackend).

pub mod mock;
#[cfg(feature = "playback")]
pub mod rodio_backend;

pub use mock::{MockBackend, MockMixer, MockPlayer, PrepareMode, CORRUPT_MARKER};
#[cfg(feature = "playback")]
pub use rodio_backend::{AudioOutput, RodioBackend, RodioMixer, RodioPlayer};
