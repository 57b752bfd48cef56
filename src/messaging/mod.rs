//! Messaging module for playback notifications
//!
//! Lifecycle events are published from whichever thread observes them (the
//! caller for effects and stops, the media pipeline for preparation and
//! completion) and fanned out to every subscriber.
//!
//! ```text
//! ┌──────────────┐   Started/Failed   ┌───────────┐
//! │ Media player │ ─────────────────> │           │      ┌──────────┐
//! │   threads    │   Completed        │ Event Bus │ ───> │ Handlers │
//! └──────────────┘                    │           │      └──────────┘
//! ┌──────────────┐   EffectPlayed     │           │
//! │ SoundManager │ ─────────────────> │           │
//! └──────────────┘   Stopped          └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let (rx, _id) = manager.subscribe();
//! let id = manager.play_sound("voice1.mp3")?;
//!
//! while let Ok(event) = rx.recv() {
//!     if event.playback_id() == Some(id) && event.is_terminal() {
//!         break;
//!     }
//! }
//! ```

pub mod bus;
pub mod events;

// Re-export commonly used types
pub use bus::{EventBus, SubscriberId};
pub use events::PlaybackEvent;
