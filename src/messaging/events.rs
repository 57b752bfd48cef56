/// Playback lifecycle events
///
/// Events represent things that have happened (past tense).
/// They are broadcast to all subscribers.
use crate::audio_system::PlaybackId;

/// Subsystem events
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// The sound effect pool finished loading
    PoolOpened { loaded: usize },

    /// The sound effect pool was released
    PoolClosed,

    /// A preloaded sound effect was triggered
    EffectPlayed { name: String, volume: f32 },

    /// A sound effect could not be played (unknown name or closed pool)
    EffectMissing { name: String },

    /// A long-form sound finished preparing and started playing
    Started {
        id: PlaybackId,
        identifier: String,
    },

    /// A long-form sound reached its natural end
    Completed { id: PlaybackId },

    /// A long-form sound was stopped explicitly
    Stopped { id: PlaybackId },

    /// A long-form sound failed to prepare
    Failed { id: PlaybackId, reason: String },
}

impl PlaybackEvent {
    /// Playback id the event refers to, if it is about a long-form sound
    pub fn playback_id(&self) -> Option<PlaybackId> {
        match self {
            PlaybackEvent::Started { id, .. }
            | PlaybackEvent::Completed { id }
            | PlaybackEvent::Stopped { id }
            | PlaybackEvent::Failed { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Whether this event ends the life of a playback id
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlaybackEvent::Completed { .. }
                | PlaybackEvent::Stopped { .. }
                | PlaybackEvent::Failed { .. }
        )
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            PlaybackEvent::PoolOpened { loaded } => format!("Loaded {} sound effects", loaded),
            PlaybackEvent::PoolClosed => "Sound effect pool closed".to_string(),
            PlaybackEvent::EffectPlayed { name, volume } => {
                format!("Played effect '{}' at volume {:.2}", name, volume)
            }
            PlaybackEvent::EffectMissing { name } => format!("Effect '{}' unavailable", name),
            PlaybackEvent::Started { id, identifier } => {
                format!("Playback {} started: {}", id, identifier)
            }
            PlaybackEvent::Completed { id } => format!("Playback {} completed", id),
            PlaybackEvent::Stopped { id } => format!("Playback {} stopped", id),
            PlaybackEvent::Failed { id, reason } => format!("Playback {} failed: {}", id, reason),
        }
    }
}
