/// Sound manager
///
/// Caller-facing entry point tying the effect pool and long-form playback together.
use std::sync::Arc;

use crossbeam_channel::Receiver;

use crate::config::AudioConfig;
use crate::error::AudioError;
use crate::messaging::{EventBus, PlaybackEvent, SubscriberId};

use super::controller::{PendingPlayback, PlaybackController, RedirectPolicy};
use super::effect_pool::{EffectManifest, EffectMixer, SoundEffectPool};
use super::player::MediaBackend;
use super::registry::{IdAllocator, PlaybackId};
use super::resolver::{AssetBundle, AssetResolver};
use super::source::AssetLocation;

/// Sound playback subsystem
///
/// Opens the effect pool on construction. Pool lifecycle calls (`open`,
/// `close`) must not overlap effect playback from other threads.
pub struct SoundManager {
    config: AudioConfig,
    bundle: Arc<dyn AssetBundle>,
    manifest: EffectManifest,
    effects: Arc<SoundEffectPool>,
    controller: PlaybackController,
    bus: EventBus,
}

impl SoundManager {
    /// Create a sound manager and load the effect pool
    pub fn new(
        config: AudioConfig,
        bundle: Arc<dyn AssetBundle>,
        mixer: Box<dyn EffectMixer>,
        backend: Arc<dyn MediaBackend>,
    ) -> Self {
        Self::with_id_allocator(config, bundle, mixer, backend, Arc::new(IdAllocator::new()))
    }

    /// Same as `new`, drawing playback ids from `ids`
    pub fn with_id_allocator(
        config: AudioConfig,
        bundle: Arc<dyn AssetBundle>,
        mixer: Box<dyn EffectMixer>,
        backend: Arc<dyn MediaBackend>,
        ids: Arc<IdAllocator>,
    ) -> Self {
        let bus = EventBus::new();
        let resolver = Arc::new(AssetResolver::from_config(&config, Arc::clone(&bundle)));
        let manifest = EffectManifest::from_bundle(bundle.as_ref(), &config);
        let effects = Arc::new(SoundEffectPool::new(mixer, bus.clone()));
        let controller = PlaybackController::new(
            resolver,
            backend,
            Arc::clone(&effects),
            ids,
            RedirectPolicy::from_config(&config),
            bus.clone(),
        );

        let manager = Self {
            config,
            bundle,
            manifest,
            effects,
            controller,
            bus,
        };
        manager.open();
        manager
    }

    /// Sound manager on the default audio device, reading the bundle from
    /// `config.asset_root`
    #[cfg(feature = "playback")]
    pub fn with_rodio(config: AudioConfig) -> Result<Self, AudioError> {
        use crate::audio_system::resolver::DirectoryBundle;
        use crate::backend::rodio_backend::{AudioOutput, RodioBackend, RodioMixer};

        let output = AudioOutput::open()?;
        let bundle = Arc::new(DirectoryBundle::new(config.asset_root.clone()));
        Ok(Self::new(
            config,
            bundle,
            Box::new(RodioMixer::new(Arc::clone(&output))),
            Arc::new(RodioBackend::new(output)),
        ))
    }

    /// Load the effect pool (no-op if already open)
    pub fn open(&self) -> usize {
        self.effects.load(self.bundle.as_ref(), &self.manifest)
    }

    /// Release the effect pool and every active sound
    pub fn close(&self) {
        self.effects.release();
        let released = self.controller.shutdown();
        if released > 0 {
            tracing::info!("Released {} active sounds on close", released);
        }
    }

    pub fn play_sound_effect(&self, name: &str) {
        self.play_sound_effect_with_volume(name, 1.0);
    }

    pub fn play_sound_effect_with_volume(&self, name: &str, volume: f32) {
        self.effects.play(name, volume);
    }

    /// Play a long-form sound and wait until it has started.
    ///
    /// Honors `prepare_timeout_ms`: on timeout the pending sound is stopped.
    pub fn play_sound(&self, identifier: &str) -> Result<PlaybackId, AudioError> {
        let pending = self.controller.play(identifier)?;
        match self.config.prepare_timeout() {
            None => pending.wait(),
            Some(timeout) => match pending.wait_timeout(timeout) {
                Err(AudioError::PrepareTimeout(id)) => {
                    tracing::warn!("'{}' did not start within {:?}", identifier, timeout);
                    self.controller.stop(id);
                    Err(AudioError::PrepareTimeout(id))
                }
                other => other,
            },
        }
    }

    /// Play a long-form sound without waiting for it to start
    pub fn play_sound_async(&self, identifier: &str) -> Result<PendingPlayback, AudioError> {
        self.controller.play(identifier)
    }

    pub fn is_playing(&self, id: PlaybackId) -> bool {
        self.controller.is_playing(id)
    }

    /// Duration in milliseconds, 0 for unknown ids
    pub fn sound_duration(&self, id: PlaybackId) -> u64 {
        self.controller.duration_ms(id)
    }

    pub fn stop_sound(&self, id: PlaybackId) {
        self.controller.stop(id);
    }

    /// Tier an identifier would resolve to
    pub fn locate(&self, identifier: &str) -> AssetLocation {
        self.controller.resolver().locate(identifier)
    }

    pub fn subscribe(&self) -> (Receiver<PlaybackEvent>, SubscriberId) {
        self.bus.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.bus.unsubscribe(id)
    }

    pub fn active_count(&self) -> usize {
        self.controller.registry().len()
    }

    pub fn is_active(&self, id: PlaybackId) -> bool {
        self.controller.registry().contains(id)
    }

    pub fn effects(&self) -> &SoundEffectPool {
        &self.effects
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }
}

impl Drop for SoundManager {
    fn drop(&mut self) {
        self.close();
    }
}
