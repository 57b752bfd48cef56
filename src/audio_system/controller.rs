/// Long-form playback orchestration
///
/// Drives a request through resolve → prepare → play and hands the caller a
/// [`PendingPlayback`] that resolves once the sound has started or failed.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};

use crate::config::AudioConfig;
use crate::error::AudioError;
use crate::messaging::{EventBus, PlaybackEvent};

use super::effect_pool::SoundEffectPool;
use super::player::{MediaBackend, PlayerEvents};
use super::registry::{ActiveSoundRegistry, IdAllocator, PlaybackId, Teardown};
use super::resolver::AssetResolver;

/// Identifiers that skip long-form playback and go straight to the effect pool
#[derive(Debug, Clone, Default)]
pub struct RedirectPolicy {
    names: HashSet<String>,
}

impl RedirectPolicy {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(config.redirect_to_pool.iter().cloned())
    }

    pub fn add(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn redirects(&self, identifier: &str) -> bool {
        self.names.contains(identifier)
    }
}

/// A play request that has been accepted but may still be preparing
#[derive(Debug)]
pub struct PendingPlayback {
    id: PlaybackId,
    inflight: Option<Inflight>,
}

/// What a pending request needs to clean up after a player that went silent
struct Inflight {
    ready: Receiver<Result<PlaybackId, AudioError>>,
    identifier: String,
    registry: Arc<ActiveSoundRegistry>,
    bus: EventBus,
}

impl std::fmt::Debug for Inflight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inflight")
            .field("identifier", &self.identifier)
            .finish()
    }
}

impl PendingPlayback {
    /// Already resolved, used for sounds redirected to the effect pool
    pub fn ready(id: PlaybackId) -> Self {
        Self { id, inflight: None }
    }

    pub fn id(&self) -> PlaybackId {
        self.id
    }

    /// Block until the sound has started or failed
    pub fn wait(self) -> Result<PlaybackId, AudioError> {
        match &self.inflight {
            None => Ok(self.id),
            Some(inflight) => inflight
                .ready
                .recv()
                .unwrap_or_else(|_| Err(self.abandoned(inflight))),
        }
    }

    /// Like `wait`, giving up after `timeout`. Giving up does not stop the sound.
    pub fn wait_timeout(self, timeout: Duration) -> Result<PlaybackId, AudioError> {
        match &self.inflight {
            None => Ok(self.id),
            Some(inflight) => match inflight.ready.recv_timeout(timeout) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => Err(AudioError::PrepareTimeout(self.id)),
                Err(RecvTimeoutError::Disconnected) => Err(self.abandoned(inflight)),
            },
        }
    }

    /// Outcome if it is already known
    pub fn try_result(&self) -> Option<Result<PlaybackId, AudioError>> {
        match &self.inflight {
            None => Some(Ok(self.id)),
            Some(inflight) => match inflight.ready.try_recv() {
                Ok(result) => Some(result),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => Some(Err(self.abandoned(inflight))),
            },
        }
    }

    /// Every sender is gone without a word. If the entry is still registered
    /// the player never reported; tear it down here.
    fn abandoned(&self, inflight: &Inflight) -> AudioError {
        if !inflight.registry.finish(self.id, Teardown::Failed) {
            return AudioError::Stopped(self.id);
        }

        let reason = "player stopped reporting before it was prepared".to_string();
        tracing::warn!("Failed to prepare '{}': {}", inflight.identifier, reason);
        inflight.bus.publish(PlaybackEvent::Failed {
            id: self.id,
            reason: reason.clone(),
        });
        AudioError::PreparationFailed {
            identifier: inflight.identifier.clone(),
            reason,
        }
    }
}

pub struct PlaybackController {
    resolver: Arc<AssetResolver>,
    registry: Arc<ActiveSoundRegistry>,
    backend: Arc<dyn MediaBackend>,
    effects: Arc<SoundEffectPool>,
    ids: Arc<IdAllocator>,
    redirects: RedirectPolicy,
    bus: EventBus,
}

impl PlaybackController {
    pub fn new(
        resolver: Arc<AssetResolver>,
        backend: Arc<dyn MediaBackend>,
        effects: Arc<SoundEffectPool>,
        ids: Arc<IdAllocator>,
        redirects: RedirectPolicy,
        bus: EventBus,
    ) -> Self {
        Self {
            resolver,
            registry: Arc::new(ActiveSoundRegistry::new()),
            backend,
            effects,
            ids,
            redirects,
            bus,
        }
    }

    pub fn registry(&self) -> &Arc<ActiveSoundRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &AssetResolver {
        &self.resolver
    }

    pub fn redirects(&self) -> &RedirectPolicy {
        &self.redirects
    }

    /// Start playing `identifier`.
    ///
    /// Resolution happens on the calling thread; preparation continues on the
    /// backend's own context.
    pub fn play(&self, identifier: &str) -> Result<PendingPlayback, AudioError> {
        if self.redirects.redirects(identifier) {
            self.effects.play(identifier, 1.0);
            return Ok(PendingPlayback::ready(PlaybackId::UNTRACKED));
        }

        let id = self.ids.next();
        self.registry.reserve(id, identifier);

        let source = match self.resolver.resolve(identifier) {
            Ok(source) => source,
            Err(e) => {
                self.registry.finish(id, Teardown::Failed);
                tracing::warn!("Cannot play '{}': {}", identifier, e);
                return Err(e);
            }
        };

        let reader = match source.reader() {
            Ok(reader) => reader,
            Err(e) => {
                self.registry.finish(id, Teardown::Failed);
                return Err(AudioError::Io {
                    path: source.location().to_string(),
                    source: e,
                });
            }
        };
        let location = source.location().clone();
        let release = source.into_release();

        let player = match self.backend.create_player(reader) {
            Ok(player) => player,
            Err(e) => {
                release.run();
                self.registry.finish(id, Teardown::Failed);
                tracing::warn!("Cannot create player for '{}': {}", identifier, e);
                return Err(e);
            }
        };

        if let Err(entry) = self.registry.attach(id, identifier, Arc::clone(&player), release) {
            entry.dispose(id, Teardown::Stopped);
            return Err(AudioError::Stopped(id));
        }

        tracing::debug!("Preparing '{}' from {} as {}", identifier, location, id);

        let (tx, rx) = bounded(1);
        let events = PlayerEvents::new(id, identifier, Arc::clone(&self.registry), self.bus.clone(), tx);
        player.prepare_async(events);

        Ok(PendingPlayback {
            id,
            inflight: Some(Inflight {
                ready: rx,
                identifier: identifier.to_string(),
                registry: Arc::clone(&self.registry),
                bus: self.bus.clone(),
            }),
        })
    }

    /// Play and block until the sound has started or failed
    pub fn play_blocking(&self, identifier: &str) -> Result<PlaybackId, AudioError> {
        self.play(identifier)?.wait()
    }

    pub fn is_playing(&self, id: PlaybackId) -> bool {
        self.registry.is_playing(id)
    }

    pub fn duration_ms(&self, id: PlaybackId) -> u64 {
        self.registry.duration_ms(id)
    }

    /// Stop and release a playback. Unknown or finished ids are ignored.
    pub fn stop(&self, id: PlaybackId) -> bool {
        if self.registry.stop(id) {
            tracing::debug!("Stopped playback {}", id);
            self.bus.publish(PlaybackEvent::Stopped { id });
            true
        } else {
            false
        }
    }

    /// Release every active sound
    pub fn shutdown(&self) -> usize {
        self.registry.clear()
    }
}
