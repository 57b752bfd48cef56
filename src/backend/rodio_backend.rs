//! rodio-backed mixer and media players.
//!
//! The `OutputStream` is not `Send`, so a dedicated thread owns it for the
//! life of [`AudioOutput`]; everything else talks to the device through the
//! cloneable `OutputStreamHandle`.
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use rodio::source::{Buffered, EmptyCallback, SamplesConverter};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio_system::{EffectHandle, EffectMixer, MediaBackend, MediaPlayer, PlayerEvents, SourceReader};
use crate::error::AudioError;

type Clip = Buffered<SamplesConverter<Decoder<Cursor<Vec<u8>>>, f32>>;

/// Owner of the default output device
pub struct AudioOutput {
    handle: OutputStreamHandle,
    shutdown: Mutex<Option<Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl AudioOutput {
    /// Open the default output device on its own thread
    pub fn open() -> Result<Arc<Self>, AudioError> {
        let (handle_tx, handle_rx) = bounded(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let thread = thread::Builder::new()
            .name("soundstage-output".to_string())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    let _ = handle_tx.send(Ok(handle));
                    // Park until the sender is dropped
                    let _ = shutdown_rx.recv();
                    drop(stream);
                    tracing::debug!("Audio output closed");
                }
                Err(e) => {
                    let _ = handle_tx.send(Err(e));
                }
            })
            .map_err(|e| AudioError::Output(Box::new(e)))?;

        let handle = handle_rx
            .recv()
            .map_err(|e| AudioError::Output(Box::new(e)))?
            .map_err(|e| AudioError::Output(Box::new(e)))?;

        tracing::info!("✓ Audio output initialized");

        Ok(Arc::new(Self {
            handle,
            shutdown: Mutex::new(Some(shutdown_tx)),
            thread: Mutex::new(Some(thread)),
        }))
    }

    pub fn handle(&self) -> &OutputStreamHandle {
        &self.handle
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        drop(self.shutdown.lock().take());
        if let Some(thread) = self.thread.lock().take() {
            let _ = thread.join();
        }
    }
}

/// Effect mixer holding fully decoded clips in memory
pub struct RodioMixer {
    output: Arc<AudioOutput>,
    clips: Mutex<HashMap<EffectHandle, Clip>>,
    next: AtomicU32,
}

impl RodioMixer {
    pub fn new(output: Arc<AudioOutput>) -> Self {
        Self {
            output,
            clips: Mutex::new(HashMap::new()),
            next: AtomicU32::new(0),
        }
    }
}

impl EffectMixer for RodioMixer {
    fn load(&self, name: &str, data: Vec<u8>) -> Result<EffectHandle, AudioError> {
        let decoder =
            Decoder::new(Cursor::new(data)).map_err(|e| AudioError::DecodeFailed(Box::new(e)))?;
        let clip = decoder.convert_samples::<f32>().buffered();

        // Warm up: decode every frame now so triggering never decodes
        let samples = clip.clone().count();
        if samples == 0 {
            return Err(AudioError::DecodeFailed(
                format!("'{}' contains no samples", name).into(),
            ));
        }

        let handle = EffectHandle(self.next.fetch_add(1, Ordering::Relaxed));
        self.clips.lock().insert(handle, clip);
        tracing::debug!("Preloaded effect '{}' ({} samples)", name, samples);
        Ok(handle)
    }

    fn trigger(&self, handle: EffectHandle, volume: f32) -> Result<(), AudioError> {
        let clip = self
            .clips
            .lock()
            .get(&handle)
            .cloned()
            .ok_or_else(|| AudioError::EffectNotLoaded(format!("handle {}", handle.0)))?;
        self.output
            .handle()
            .play_raw(clip.amplify(volume))
            .map_err(|e| AudioError::Output(Box::new(e)))
    }

    fn unload_all(&self) {
        self.clips.lock().clear();
    }
}

/// Creates sink-backed players on the shared output
pub struct RodioBackend {
    output: Arc<AudioOutput>,
}

impl RodioBackend {
    pub fn new(output: Arc<AudioOutput>) -> Self {
        Self { output }
    }
}

impl MediaBackend for RodioBackend {
    fn create_player(&self, source: SourceReader) -> Result<Arc<dyn MediaPlayer>, AudioError> {
        Ok(Arc::new(RodioPlayer::new(Arc::clone(&self.output), source)))
    }
}

/// Long-form player streaming one source through its own `Sink`
pub struct RodioPlayer {
    output: Arc<AudioOutput>,
    source: Mutex<Option<SourceReader>>,
    sink: Arc<Mutex<Option<Sink>>>,
    duration_ms: Arc<AtomicU64>,
    released: Arc<AtomicBool>,
}

impl RodioPlayer {
    fn new(output: Arc<AudioOutput>, source: SourceReader) -> Self {
        Self {
            output,
            source: Mutex::new(Some(source)),
            sink: Arc::new(Mutex::new(None)),
            duration_ms: Arc::new(AtomicU64::new(0)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl MediaPlayer for RodioPlayer {
    fn prepare_async(&self, events: PlayerEvents) {
        let Some(mut source) = self.source.lock().take() else {
            events.failed("player was already prepared");
            return;
        };

        let handle = self.output.handle().clone();
        let sink_slot = Arc::clone(&self.sink);
        let duration_ms = Arc::clone(&self.duration_ms);
        let released = Arc::clone(&self.released);
        let on_spawn_error = events.clone();

        let spawned = thread::Builder::new()
            .name("soundstage-prepare".to_string())
            .spawn(move || {
                let prepared = (|| -> Result<(Sink, u64), String> {
                    let data = source.read_to_vec().map_err(|e| e.to_string())?;
                    let probed = probe_duration_ms(data.clone(), source.extension());

                    let decoder = Decoder::new(Cursor::new(data)).map_err(|e| e.to_string())?;
                    let duration = probed
                        .or_else(|| decoder.total_duration().map(|d| d.as_millis() as u64))
                        .unwrap_or(0);

                    let sink = Sink::try_new(&handle).map_err(|e| e.to_string())?;
                    sink.pause();
                    sink.append(decoder);

                    let done = events.clone();
                    sink.append(EmptyCallback::<f32>::new(Box::new(move || {
                        complete_off_mixer(done.clone());
                    })));
                    Ok((sink, duration))
                })();

                match prepared {
                    Ok((sink, duration)) => {
                        duration_ms.store(duration, Ordering::SeqCst);
                        {
                            let mut slot = sink_slot.lock();
                            if released.load(Ordering::SeqCst) {
                                sink.stop();
                            } else {
                                *slot = Some(sink);
                            }
                        }
                        events.prepared();
                    }
                    Err(reason) => events.failed(reason),
                }
            });

        if let Err(e) = spawned {
            tracing::error!("Failed to spawn prepare thread: {}", e);
            on_spawn_error.failed(format!("cannot spawn prepare thread: {}", e));
        }
    }

    fn start(&self) {
        if let Some(sink) = self.sink.lock().as_ref() {
            sink.play();
        }
    }

    fn stop(&self) {
        if let Some(sink) = self.sink.lock().as_ref() {
            sink.stop();
        }
    }

    fn is_playing(&self) -> bool {
        self.sink
            .lock()
            .as_ref()
            .map(|sink| !sink.is_paused() && !sink.empty())
            .unwrap_or(false)
    }

    fn duration_ms(&self) -> u64 {
        self.duration_ms.load(Ordering::SeqCst)
    }

    fn release(&self) -> Result<(), AudioError> {
        let sink = {
            let mut slot = self.sink.lock();
            self.released.store(true, Ordering::SeqCst);
            slot.take()
        };
        if let Some(sink) = sink {
            sink.stop();
        }
        self.source.lock().take();
        Ok(())
    }
}

/// Deliver completion away from the mixer thread, inline if no thread can
/// be spawned
fn complete_off_mixer(done: PlayerEvents) {
    let inline = done.clone();
    let spawned = thread::Builder::new()
        .name("soundstage-complete".to_string())
        .spawn(move || done.completed());
    if let Err(e) = spawned {
        tracing::warn!("Completing {} on the mixer thread: {}", inline.id(), e);
        inline.completed();
    }
}

/// Length of the first decodable track, from container metadata
fn probe_duration_ms(data: Vec<u8>, extension: Option<&str>) -> Option<u64> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .ok()?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)?;
    let frames = track.codec_params.n_frames?;
    let sample_rate = track.codec_params.sample_rate?;
    if sample_rate == 0 {
        return None;
    }
    Some(frames.saturating_mul(1000) / u64::from(sample_rate))
}
