/// Lifecycle of a registered long-form sound
///
/// ```text
/// Resolving ─> Preparing ─> Playing
/// ```
///
/// Completion, stop and failure remove the entry instead of recording a
/// terminal state.
use std::time::Instant;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PlaybackState {
    /// Id allocated, source being opened
    Resolving,

    /// Player attached, waiting for the media pipeline
    Preparing,

    /// Playback started
    Playing { since: Instant },
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_playing_is_playing() {
        let state = PlaybackState::Playing {
            since: Instant::now(),
        };
        assert!(state.is_playing());
        assert!(!PlaybackState::Resolving.is_playing());
        assert!(!PlaybackState::Preparing.is_playing());
    }
}
