/// Registry of active long-form sounds
///
/// Maps playback ids to live players. Every entry is torn down exactly once:
/// removal happens under the lock, cleanup happens on whichever caller won
/// the removal.
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use super::player::MediaPlayer;
use super::source::SourceRelease;
use super::state::PlaybackState;

/// Opaque handle for a long-form playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackId(i64);

impl PlaybackId {
    /// Returned for sounds that play through the effect pool and are not tracked
    pub const UNTRACKED: PlaybackId = PlaybackId(-1);

    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn get(self) -> i64 {
        self.0
    }

    pub fn is_tracked(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for PlaybackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic playback id source shared by all concurrent requests
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicI64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }

    pub fn next(&self) -> PlaybackId {
        PlaybackId(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// The id the next request will receive
    pub fn peek(&self) -> PlaybackId {
        PlaybackId(self.next.load(Ordering::SeqCst))
    }
}

/// Why an entry is being torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    Completed,
    Stopped,
    Failed,
    Closed,
}

/// A registered long-form sound and everything it owns
pub struct ActivePlayback {
    identifier: String,
    state: PlaybackState,
    player: Option<Arc<dyn MediaPlayer>>,
    release: SourceRelease,
}

impl ActivePlayback {
    pub fn new(
        identifier: impl Into<String>,
        player: Option<Arc<dyn MediaPlayer>>,
        release: SourceRelease,
    ) -> Self {
        let state = if player.is_some() {
            PlaybackState::Preparing
        } else {
            PlaybackState::Resolving
        };
        Self {
            identifier: identifier.into(),
            state,
            player,
            release,
        }
    }

    /// Entry that makes an id queryable before its source is open
    pub fn placeholder(identifier: impl Into<String>) -> Self {
        Self::new(identifier, None, SourceRelease::noop())
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn player(&self) -> Option<&Arc<dyn MediaPlayer>> {
        self.player.as_ref()
    }

    /// Release the player and close the source. Failures are logged, never raised.
    pub(crate) fn dispose(self, id: PlaybackId, teardown: Teardown) {
        if let Some(player) = &self.player {
            if teardown == Teardown::Stopped || teardown == Teardown::Closed {
                player.stop();
            }
            if let Err(e) = player.release() {
                tracing::warn!("Failed to release player for {}: {}", id, e);
            }
        }
        if !self.release.run() {
            tracing::trace!("Source for {} had nothing left to release", id);
        }
        tracing::debug!(
            "Tore down playback {} ('{}', {:?})",
            id,
            self.identifier,
            teardown
        );
    }
}

impl fmt::Debug for ActivePlayback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivePlayback")
            .field("identifier", &self.identifier)
            .field("state", &self.state)
            .field("has_player", &self.player.is_some())
            .finish()
    }
}

/// Concurrent map of playback id to active playback
#[derive(Default)]
pub struct ActiveSoundRegistry {
    entries: Mutex<HashMap<PlaybackId, ActivePlayback>>,
}

impl ActiveSoundRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning any entry it displaced
    pub fn insert(&self, id: PlaybackId, entry: ActivePlayback) -> Option<ActivePlayback> {
        self.entries.lock().insert(id, entry)
    }

    /// Register a placeholder so `id` is queryable while its source resolves
    pub fn reserve(&self, id: PlaybackId, identifier: &str) {
        if let Some(old) = self.insert(id, ActivePlayback::placeholder(identifier)) {
            tracing::error!("Playback id {} was reused; releasing previous entry", id);
            old.dispose(id, Teardown::Closed);
        }
    }

    /// Attach a prepared player to a reserved id.
    ///
    /// If the id is gone (stopped while resolving) the pieces come back as an
    /// entry for the caller to dispose.
    pub fn attach(
        &self,
        id: PlaybackId,
        identifier: &str,
        player: Arc<dyn MediaPlayer>,
        release: SourceRelease,
    ) -> Result<(), ActivePlayback> {
        let mut entries = self.entries.lock();
        match entries.get_mut(&id) {
            Some(entry) => {
                entry.player = Some(player);
                entry.release = release;
                entry.state = PlaybackState::Preparing;
                Ok(())
            }
            None => Err(ActivePlayback::new(identifier, Some(player), release)),
        }
    }

    /// Start a prepared player. Returns false if the id is no longer registered.
    pub fn start(&self, id: PlaybackId) -> bool {
        let player = {
            let mut entries = self.entries.lock();
            let Some(entry) = entries.get_mut(&id) else {
                return false;
            };
            let Some(player) = entry.player.clone() else {
                return false;
            };
            if entry.state.is_playing() {
                return true;
            }
            entry.state = PlaybackState::Playing {
                since: Instant::now(),
            };
            player
        };
        // Outside the lock: a player may deliver completion from inside start
        player.start();
        true
    }

    pub fn get(&self, id: PlaybackId) -> Option<Arc<dyn MediaPlayer>> {
        self.entries.lock().get(&id).and_then(|e| e.player.clone())
    }

    pub fn state(&self, id: PlaybackId) -> Option<PlaybackState> {
        self.entries.lock().get(&id).map(|e| e.state)
    }

    pub fn contains(&self, id: PlaybackId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    /// Remove an entry without releasing it
    pub fn remove(&self, id: PlaybackId) -> Option<ActivePlayback> {
        self.entries.lock().remove(&id)
    }

    /// Remove and release an entry. Only the first caller for an id gets true.
    pub fn finish(&self, id: PlaybackId, teardown: Teardown) -> bool {
        match self.remove(id) {
            Some(entry) => {
                entry.dispose(id, teardown);
                true
            }
            None => false,
        }
    }

    pub fn is_playing(&self, id: PlaybackId) -> bool {
        self.get(id).map(|p| p.is_playing()).unwrap_or(false)
    }

    pub fn duration_ms(&self, id: PlaybackId) -> u64 {
        self.get(id).map(|p| p.duration_ms()).unwrap_or(0)
    }

    /// Stop and release an entry; unknown ids are ignored
    pub fn stop(&self, id: PlaybackId) -> bool {
        self.finish(id, Teardown::Stopped)
    }

    /// Release every entry and empty the map in one step
    pub fn clear(&self) -> usize {
        let drained: Vec<(PlaybackId, ActivePlayback)> = self.entries.lock().drain().collect();
        let count = drained.len();
        for (id, entry) in drained {
            entry.dispose(id, Teardown::Closed);
        }
        if count > 0 {
            tracing::debug!("Released {} active sounds", count);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn ids(&self) -> Vec<PlaybackId> {
        let mut ids: Vec<_> = self.entries.lock().keys().copied().collect();
        ids.sort();
        ids
    }
}
