//! In-memory backend for tests and headless hosts.
//!
//! Nothing here touches an audio device. Players record every call so tests
//! can assert on start/stop/release counts, and preparation can be completed
//! immediately, on a worker thread, or by hand.
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::audio_system::{EffectHandle, EffectMixer, MediaBackend, MediaPlayer, PlayerEvents, SourceReader};
use crate::error::AudioError;

/// Leading bytes that make the mock backend treat a source as malformed
pub const CORRUPT_MARKER: &[u8] = b"CORRUPT";

/// How a mock player finishes preparing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrepareMode {
    /// Report prepared from inside `prepare_async`
    Immediate,
    /// Report prepared from a spawned thread
    Threaded,
    /// Wait for the test to call `finish_prepare` or `fail_prepare`
    Manual,
    /// Report a preparation failure
    Fail(String),
    /// Drop the notification sink without reporting anything
    Silent,
}

#[derive(Default)]
struct MixerState {
    clips: Mutex<HashMap<EffectHandle, String>>,
    corrupt: Mutex<HashSet<String>>,
    triggers: Mutex<Vec<(String, f32)>>,
    next: AtomicU32,
    unloads: AtomicUsize,
}

/// Effect mixer that records triggers instead of playing them
#[derive(Clone, Default)]
pub struct MockMixer {
    state: Arc<MixerState>,
}

impl MockMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make loading `name` fail as if the clip could not be decoded
    pub fn with_corrupt(self, name: &str) -> Self {
        self.state.corrupt.lock().insert(name.to_string());
        self
    }

    /// Every trigger so far as (name, volume)
    pub fn triggers(&self) -> Vec<(String, f32)> {
        self.state.triggers.lock().clone()
    }

    pub fn loaded_count(&self) -> usize {
        self.state.clips.lock().len()
    }

    pub fn unload_count(&self) -> usize {
        self.state.unloads.load(Ordering::SeqCst)
    }
}

impl EffectMixer for MockMixer {
    fn load(&self, name: &str, data: Vec<u8>) -> Result<EffectHandle, AudioError> {
        if data.is_empty() || self.state.corrupt.lock().contains(name) {
            return Err(AudioError::DecodeFailed(
                format!("cannot decode '{}'", name).into(),
            ));
        }
        let handle = EffectHandle(self.state.next.fetch_add(1, Ordering::SeqCst));
        self.state.clips.lock().insert(handle, name.to_string());
        Ok(handle)
    }

    fn trigger(&self, handle: EffectHandle, volume: f32) -> Result<(), AudioError> {
        let name = self
            .state
            .clips
            .lock()
            .get(&handle)
            .cloned()
            .ok_or_else(|| AudioError::EffectNotLoaded(format!("handle {}", handle.0)))?;
        self.state.triggers.lock().push((name, volume));
        Ok(())
    }

    fn unload_all(&self) {
        self.state.clips.lock().clear();
        self.state.unloads.fetch_add(1, Ordering::SeqCst);
    }
}

/// Player that records calls and lets tests drive its notifications
pub struct MockPlayer {
    identifier: String,
    duration_ms: u64,
    mode: PrepareMode,
    events: Mutex<Option<PlayerEvents>>,
    playing: AtomicBool,
    released: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    releases: AtomicUsize,
}

impl MockPlayer {
    pub fn new(identifier: impl Into<String>, duration_ms: u64) -> Self {
        Self::with_mode(identifier, duration_ms, PrepareMode::Manual)
    }

    pub fn with_mode(identifier: impl Into<String>, duration_ms: u64, mode: PrepareMode) -> Self {
        Self {
            identifier: identifier.into(),
            duration_ms,
            mode,
            events: Mutex::new(None),
            playing: AtomicBool::new(false),
            released: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    fn events(&self) -> Option<PlayerEvents> {
        self.events.lock().clone()
    }

    /// Deliver the prepared notification. False if preparation never began.
    pub fn finish_prepare(&self) -> bool {
        match self.events() {
            Some(events) => {
                events.prepared();
                true
            }
            None => false,
        }
    }

    pub fn fail_prepare(&self, reason: &str) -> bool {
        match self.events() {
            Some(events) => {
                events.failed(reason);
                true
            }
            None => false,
        }
    }

    /// Deliver a natural completion, even if the player was already stopped
    pub fn complete_naturally(&self) -> bool {
        match self.events() {
            Some(events) => {
                self.playing.store(false, Ordering::SeqCst);
                events.completed();
                true
            }
            None => false,
        }
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl MediaPlayer for MockPlayer {
    fn prepare_async(&self, events: PlayerEvents) {
        if self.mode == PrepareMode::Silent {
            return;
        }
        *self.events.lock() = Some(events.clone());
        match &self.mode {
            PrepareMode::Immediate => events.prepared(),
            PrepareMode::Threaded => {
                std::thread::spawn(move || events.prepared());
            }
            PrepareMode::Manual => {}
            PrepareMode::Fail(reason) => events.failed(reason.clone()),
            PrepareMode::Silent => {}
        }
    }

    fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if !self.released.load(Ordering::SeqCst) {
            self.playing.store(true, Ordering::SeqCst);
        }
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    fn release(&self) -> Result<(), AudioError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
        if self.released.swap(true, Ordering::SeqCst) {
            return Err(AudioError::ReleaseFailed(format!(
                "'{}' released twice",
                self.identifier
            )));
        }
        Ok(())
    }
}

/// Media backend producing [`MockPlayer`]s
pub struct MockBackend {
    mode: Mutex<PrepareMode>,
    duration_ms: AtomicU64,
    players: Mutex<Vec<Arc<MockPlayer>>>,
}

impl MockBackend {
    /// Players prepare immediately and report a one second duration
    pub fn new() -> Self {
        Self::with_mode(PrepareMode::Immediate)
    }

    pub fn with_mode(mode: PrepareMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            duration_ms: AtomicU64::new(1000),
            players: Mutex::new(Vec::new()),
        }
    }

    pub fn set_mode(&self, mode: PrepareMode) {
        *self.mode.lock() = mode;
    }

    pub fn set_duration_ms(&self, ms: u64) {
        self.duration_ms.store(ms, Ordering::SeqCst);
    }

    /// Every player created so far, oldest first
    pub fn players(&self) -> Vec<Arc<MockPlayer>> {
        self.players.lock().clone()
    }

    pub fn last_player(&self) -> Option<Arc<MockPlayer>> {
        self.players.lock().last().cloned()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaBackend for MockBackend {
    fn create_player(&self, mut source: SourceReader) -> Result<Arc<dyn MediaPlayer>, AudioError> {
        let data = source.read_to_vec().map_err(|e| AudioError::Io {
            path: source.identifier().to_string(),
            source: e,
        })?;

        let mode = if data.starts_with(CORRUPT_MARKER) {
            PrepareMode::Fail("malformed media".to_string())
        } else {
            self.mode.lock().clone()
        };

        let player = Arc::new(MockPlayer::with_mode(
            source.identifier(),
            self.duration_ms.load(Ordering::SeqCst),
            mode,
        ));
        self.players.lock().push(Arc::clone(&player));
        Ok(player)
    }
}
