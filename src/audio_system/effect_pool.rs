/// Preloaded sound effect pool
///
/// Short clips are decoded once when the pool opens and triggered by name
/// with no per-play I/O. Playback is fire-and-forget: failures are logged,
/// never returned to the triggering code path.
use std::collections::HashMap;

use parking_lot::RwLock;

use crate::config::AudioConfig;
use crate::error::AudioError;
use crate::messaging::{EventBus, PlaybackEvent};

use super::resolver::{bundle_path, AssetBundle};

/// Mixer-side id of a loaded clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectHandle(pub u32);

/// Low-latency mixer that holds decoded clips
pub trait EffectMixer: Send + Sync {
    /// Decode and keep a clip, returning its handle
    fn load(&self, name: &str, data: Vec<u8>) -> Result<EffectHandle, AudioError>;

    /// Play a loaded clip at `volume` (0.0-1.0) without waiting for it
    fn trigger(&self, handle: EffectHandle, volume: f32) -> Result<(), AudioError>;

    /// Drop every loaded clip
    fn unload_all(&self);
}

/// One clip to preload: the name it is played by and where it lives in the bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub asset_path: String,
}

/// Fixed list of clips loaded when the pool opens
#[derive(Debug, Clone, Default)]
pub struct EffectManifest {
    entries: Vec<ManifestEntry>,
}

impl EffectManifest {
    /// Every file in the bundle's sounds directory plus the configured extras
    /// from the audio directory itself
    pub fn from_bundle(bundle: &dyn AssetBundle, config: &AudioConfig) -> Self {
        let sounds_path = bundle_path(&config.audio_dir, &config.sounds_dir);
        let mut manifest = match bundle.list(&sounds_path) {
            Ok(names) => Self::from_names(&sounds_path, names),
            Err(e) => {
                tracing::warn!("Failed to list sound effects in '{}': {}", sounds_path, e);
                Self::default()
            }
        };
        for name in &config.extra_effects {
            manifest.push(name.clone(), bundle_path(&config.audio_dir, name));
        }
        manifest
    }

    pub fn from_names<I, S>(dir: &str, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut manifest = Self::default();
        for name in names {
            let name = name.into();
            let asset_path = bundle_path(dir, &name);
            manifest.push(name, asset_path);
        }
        manifest
    }

    pub fn push(&mut self, name: impl Into<String>, asset_path: impl Into<String>) {
        self.entries.push(ManifestEntry {
            name: name.into(),
            asset_path: asset_path.into(),
        });
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Name-keyed pool of preloaded sound effects.
///
/// `None` in the map slot means the pool is closed.
pub struct SoundEffectPool {
    mixer: Box<dyn EffectMixer>,
    loaded: RwLock<Option<HashMap<String, EffectHandle>>>,
    bus: EventBus,
}

impl SoundEffectPool {
    /// Create a closed pool
    pub fn new(mixer: Box<dyn EffectMixer>, bus: EventBus) -> Self {
        Self {
            mixer,
            loaded: RwLock::new(None),
            bus,
        }
    }

    /// Load every manifest entry. A clip that fails to load is skipped.
    ///
    /// Opening an already open pool keeps it as is.
    pub fn load(&self, bundle: &dyn AssetBundle, manifest: &EffectManifest) -> usize {
        let mut loaded = self.loaded.write();
        if let Some(map) = loaded.as_ref() {
            tracing::debug!("Sound effect pool already open ({} effects)", map.len());
            return map.len();
        }

        let mut map = HashMap::with_capacity(manifest.len());
        for entry in manifest.entries() {
            let data = match bundle.read(&entry.asset_path) {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!("Skipping sound effect '{}': {}", entry.asset_path, e);
                    continue;
                }
            };
            match self.mixer.load(&entry.name, data) {
                Ok(handle) => {
                    if map.insert(entry.name.clone(), handle).is_some() {
                        tracing::debug!("Sound effect '{}' listed twice, keeping last", entry.name);
                    }
                }
                Err(e) => tracing::warn!("Skipping sound effect '{}': {}", entry.asset_path, e),
            }
        }

        let count = map.len();
        *loaded = Some(map);
        drop(loaded);

        tracing::info!("✓ Loaded {} of {} sound effects", count, manifest.len());
        self.bus.publish(PlaybackEvent::PoolOpened { loaded: count });
        count
    }

    /// Play an effect, reporting why it could not be played
    pub fn try_play(&self, name: &str, volume: f32) -> Result<(), AudioError> {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };

        let loaded = self.loaded.read();
        let map = loaded
            .as_ref()
            .ok_or_else(|| AudioError::PoolUnavailable(name.to_string()))?;
        let handle = map
            .get(name)
            .copied()
            .ok_or_else(|| AudioError::EffectNotLoaded(name.to_string()))?;
        self.mixer.trigger(handle, volume)?;
        drop(loaded);

        self.bus.publish(PlaybackEvent::EffectPlayed {
            name: name.to_string(),
            volume,
        });
        Ok(())
    }

    /// Fire-and-forget playback; failures are logged only
    pub fn play(&self, name: &str, volume: f32) {
        if let Err(e) = self.try_play(name, volume) {
            tracing::error!("{}", e);
            if matches!(e, AudioError::PoolUnavailable(_) | AudioError::EffectNotLoaded(_)) {
                self.bus.publish(PlaybackEvent::EffectMissing {
                    name: name.to_string(),
                });
            }
        }
    }

    /// Discard every preloaded clip and close the pool
    pub fn release(&self) -> bool {
        let mut loaded = self.loaded.write();
        if loaded.take().is_none() {
            return false;
        }
        self.mixer.unload_all();
        drop(loaded);

        tracing::info!("Sound effect pool released");
        self.bus.publish(PlaybackEvent::PoolClosed);
        true
    }

    pub fn is_open(&self) -> bool {
        self.loaded.read().is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.loaded
            .read()
            .as_ref()
            .map(|map| map.contains_key(name))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.loaded.read().as_ref().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loaded effect names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .loaded
            .read()
            .as_ref()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}
