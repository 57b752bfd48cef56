/// Long-form media players
///
/// A backend turns an opened source into a player; the player prepares on
/// its own execution context and reports back through [`PlayerEvents`].
use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::error::AudioError;
use crate::messaging::{EventBus, PlaybackEvent};

use super::registry::{ActiveSoundRegistry, PlaybackId, Teardown};
use super::source::SourceReader;

/// One long-form playback engine instance.
///
/// All methods may be called from any thread. Calls after `release` must be
/// harmless no-ops.
pub trait MediaPlayer: Send + Sync {
    /// Begin asynchronous preparation. Exactly one of `events.prepared()` or
    /// `events.failed(..)` is expected, later followed by `events.completed()`
    /// if playback reaches its end.
    fn prepare_async(&self, events: PlayerEvents);

    fn start(&self);

    fn stop(&self);

    fn is_playing(&self) -> bool;

    /// Total length in milliseconds, 0 when unknown
    fn duration_ms(&self) -> u64;

    /// Free the engine's resources
    fn release(&self) -> Result<(), AudioError>;
}

/// Creates media players for resolved sources
pub trait MediaBackend: Send + Sync {
    fn create_player(&self, source: SourceReader) -> Result<Arc<dyn MediaPlayer>, AudioError>;
}

/// Notification sink handed to a player while it prepares and plays.
///
/// Cloneable so a backend can hand copies to whatever thread delivers the
/// notification. Every method is safe to call more than once.
#[derive(Clone)]
pub struct PlayerEvents {
    id: PlaybackId,
    identifier: Arc<str>,
    registry: Arc<ActiveSoundRegistry>,
    bus: EventBus,
    ready: Sender<Result<PlaybackId, AudioError>>,
}

impl PlayerEvents {
    pub(crate) fn new(
        id: PlaybackId,
        identifier: &str,
        registry: Arc<ActiveSoundRegistry>,
        bus: EventBus,
        ready: Sender<Result<PlaybackId, AudioError>>,
    ) -> Self {
        Self {
            id,
            identifier: Arc::from(identifier),
            registry,
            bus,
            ready,
        }
    }

    pub fn id(&self) -> PlaybackId {
        self.id
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Preparation succeeded: start playback and wake the waiting caller
    pub fn prepared(&self) {
        if self.registry.start(self.id) {
            tracing::info!("Playing '{}' as {}", self.identifier, self.id);
            self.bus.publish(PlaybackEvent::Started {
                id: self.id,
                identifier: self.identifier.to_string(),
            });
            let _ = self.ready.try_send(Ok(self.id));
        } else {
            tracing::debug!("Playback {} was stopped while preparing", self.id);
            let _ = self.ready.try_send(Err(AudioError::Stopped(self.id)));
        }
    }

    /// Preparation failed: tear down and fail the waiting caller
    pub fn failed(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.registry.finish(self.id, Teardown::Failed) {
            tracing::warn!("Failed to prepare '{}': {}", self.identifier, reason);
            self.bus.publish(PlaybackEvent::Failed {
                id: self.id,
                reason: reason.clone(),
            });
        }
        let _ = self.ready.try_send(Err(AudioError::PreparationFailed {
            identifier: self.identifier.to_string(),
            reason,
        }));
    }

    /// Natural end of playback. A no-op if the id was already torn down.
    pub fn completed(&self) {
        if self.registry.finish(self.id, Teardown::Completed) {
            tracing::debug!("Playback {} completed", self.id);
            self.bus.publish(PlaybackEvent::Completed { id: self.id });
        } else {
            tracing::trace!("Ignoring completion for finished playback {}", self.id);
        }
    }
}

impl std::fmt::Debug for PlayerEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerEvents")
            .field("id", &self.id)
            .field("identifier", &self.identifier)
            .finish()
    }
}
