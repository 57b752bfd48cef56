// Integration tests for soundstage
// These run the full manager against an on-disk bundle and the mock backend

use std::fs;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::time::Duration;

use soundstage::audio_system::{DirectoryBundle, IdAllocator, MediaPlayer, PlaybackId};
use soundstage::backend::{MockBackend, MockMixer, PrepareMode, CORRUPT_MARKER};
use soundstage::{AssetLocation, AudioConfig, AudioError, PlaybackEvent, SoundManager};
use tempfile::TempDir;

struct Fixture {
    _assets: TempDir,
    private: TempDir,
    outside: TempDir,
    mixer: MockMixer,
    backend: Arc<MockBackend>,
    manager: SoundManager,
}

fn write(path: &Path, data: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, data).unwrap();
}

/// Bundle layout:
///   HTML5/pop.mp3, HTML5/voice.mp3, HTML5/broken.mp3
///   HTML5/sounds/cut.mp3, HTML5/sounds/click.mp3
///   HTML5/samples/dog.mp3
fn fixture_with(mode: PrepareMode, configure: impl FnOnce(&mut AudioConfig)) -> Fixture {
    let assets = tempfile::tempdir().unwrap();
    let private = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();

    let html5 = assets.path().join("HTML5");
    write(&html5.join("pop.mp3"), b"pop");
    write(&html5.join("voice.mp3"), b"voice");
    write(&html5.join("broken.mp3"), &[CORRUPT_MARKER, b"junk".as_slice()].concat());
    write(&html5.join("sounds").join("cut.mp3"), b"cut");
    write(&html5.join("sounds").join("click.mp3"), b"click");
    write(&html5.join("samples").join("dog.mp3"), b"woof");
    write(&private.path().join("voice1.mp3"), b"recorded");
    write(&outside.path().join("abs.mp3"), b"absolute");

    let mut config = AudioConfig::with_dirs(assets.path(), private.path());
    configure(&mut config);

    let mixer = MockMixer::new();
    let backend = Arc::new(MockBackend::with_mode(mode));
    let manager = SoundManager::with_id_allocator(
        config,
        Arc::new(DirectoryBundle::new(assets.path())),
        Box::new(mixer.clone()),
        backend.clone(),
        Arc::new(IdAllocator::new()),
    );

    Fixture {
        _assets: assets,
        private,
        outside,
        mixer,
        backend,
        manager,
    }
}

fn fixture() -> Fixture {
    fixture_with(PrepareMode::Immediate, |_| {})
}

fn drain(rx: &crossbeam_channel::Receiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
    rx.try_iter().collect()
}

#[test]
fn test_pool_loads_sounds_dir_and_pop() {
    let fx = fixture();
    assert_eq!(
        fx.manager.effects().names(),
        vec!["click.mp3".to_string(), "cut.mp3".to_string(), "pop.mp3".to_string()]
    );
    assert_eq!(fx.mixer.loaded_count(), 3);
}

#[test]
fn test_pop_redirects_to_pool() {
    let fx = fixture();
    let (rx, _sub) = fx.manager.subscribe();

    let id = fx.manager.play_sound("pop.mp3").unwrap();

    assert_eq!(id, PlaybackId::UNTRACKED);
    assert_eq!(id.get(), -1);
    assert_eq!(fx.mixer.triggers(), vec![("pop.mp3".to_string(), 1.0)]);
    assert_eq!(fx.manager.active_count(), 0);
    assert!(fx.backend.players().is_empty());
    assert!(drain(&rx).contains(&PlaybackEvent::EffectPlayed {
        name: "pop.mp3".to_string(),
        volume: 1.0,
    }));
}

#[test]
fn test_effects_play_by_name_and_volume() {
    let fx = fixture();
    fx.manager.play_sound_effect("cut.mp3");
    fx.manager.play_sound_effect_with_volume("click.mp3", 0.25);
    fx.manager.play_sound_effect_with_volume("click.mp3", 7.0);

    assert_eq!(
        fx.mixer.triggers(),
        vec![
            ("cut.mp3".to_string(), 1.0),
            ("click.mp3".to_string(), 0.25),
            ("click.mp3".to_string(), 1.0),
        ]
    );
}

#[test]
fn test_unknown_effect_is_silent() {
    let fx = fixture();
    let (rx, _sub) = fx.manager.subscribe();

    fx.manager.play_sound_effect("nonexistent.mp3");

    assert!(fx.mixer.triggers().is_empty());
    assert_eq!(fx.manager.active_count(), 0);
    assert!(drain(&rx).contains(&PlaybackEvent::EffectMissing {
        name: "nonexistent.mp3".to_string(),
    }));
}

#[test]
fn test_absolute_path_plays_then_completes() {
    let fx = fixture();
    let path = fx.outside.path().join("abs.mp3");
    let identifier = path.to_str().unwrap();

    let id = fx.manager.play_sound(identifier).unwrap();
    assert_eq!(id, PlaybackId::new(0));
    assert!(fx.manager.is_playing(id));
    assert_eq!(fx.manager.sound_duration(id), 1000);

    let player = fx.backend.last_player().unwrap();
    assert_eq!(player.start_count(), 1);

    assert!(player.complete_naturally());
    assert!(!fx.manager.is_active(id));
    assert!(!fx.manager.is_playing(id));
    assert_eq!(fx.manager.sound_duration(id), 0);
    assert_eq!(player.release_count(), 1);
}

#[test]
fn test_each_tier_resolves() {
    let fx = fixture();
    let abs = fx.outside.path().join("abs.mp3");

    assert_eq!(
        fx.manager.locate(abs.to_str().unwrap()),
        AssetLocation::Absolute(abs.clone())
    );
    assert_eq!(
        fx.manager.locate("voice.mp3"),
        AssetLocation::BundledAsset("voice.mp3".to_string())
    );
    assert_eq!(
        fx.manager.locate("samples/dog.mp3"),
        AssetLocation::BundledAsset("samples/dog.mp3".to_string())
    );
    assert_eq!(
        fx.manager.locate("voice1.mp3"),
        AssetLocation::AppPrivateFile("voice1.mp3".to_string())
    );

    for identifier in ["voice.mp3", "samples/dog.mp3", "voice1.mp3", abs.to_str().unwrap()] {
        let id = fx.manager.play_sound(identifier).unwrap();
        assert!(fx.manager.is_playing(id), "{} should be playing", identifier);
    }
    assert_eq!(fx.manager.active_count(), 4);
}

#[test]
fn test_private_file_written_later_is_found() {
    let fx = fixture();
    assert!(matches!(
        fx.manager.play_sound("voice2.mp3"),
        Err(AudioError::AssetNotFound(ref name)) if name == "voice2.mp3"
    ));

    fs::write(fx.private.path().join("voice2.mp3"), b"late").unwrap();
    let id = fx.manager.play_sound("voice2.mp3").unwrap();
    assert!(fx.manager.is_playing(id));
}

#[test]
fn test_missing_asset_consumes_id() {
    let fx = fixture();

    let err = fx.manager.play_sound("missing.mp3").unwrap_err();
    assert!(matches!(err, AudioError::AssetNotFound(ref name) if name == "missing.mp3"));
    assert_eq!(fx.manager.active_count(), 0);
    assert!(fx.backend.players().is_empty());

    let id = fx.manager.play_sound("voice.mp3").unwrap();
    assert_eq!(id, PlaybackId::new(1));
}

#[test]
fn test_ids_strictly_increase() {
    let fx = fixture();
    let mut last = PlaybackId::UNTRACKED;
    for _ in 0..10 {
        let id = fx.manager.play_sound("samples/dog.mp3").unwrap();
        assert!(id > last);
        last = id;
    }
    // Redirected plays do not draw ids
    fx.manager.play_sound("pop.mp3").unwrap();
    assert_eq!(fx.manager.play_sound("voice.mp3").unwrap(), PlaybackId::new(10));
}

#[test]
fn test_unknown_ids_are_benign() {
    let fx = fixture();
    for id in [PlaybackId::UNTRACKED, PlaybackId::new(42)] {
        assert!(!fx.manager.is_playing(id));
        assert_eq!(fx.manager.sound_duration(id), 0);
        fx.manager.stop_sound(id);
    }
    assert_eq!(fx.manager.active_count(), 0);
}

#[test]
fn test_stop_releases_and_completion_is_ignored() {
    let fx = fixture();
    let (rx, _sub) = fx.manager.subscribe();

    let id = fx.manager.play_sound("voice.mp3").unwrap();
    let player = fx.backend.last_player().unwrap();

    fx.manager.stop_sound(id);
    fx.manager.stop_sound(id);
    assert!(player.complete_naturally());

    assert_eq!(player.stop_count(), 1);
    assert_eq!(player.release_count(), 1);
    assert!(!fx.manager.is_active(id));

    let terminal: Vec<_> = drain(&rx).into_iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(terminal, vec![PlaybackEvent::Stopped { id }]);
}

#[test]
fn test_concurrent_stop_and_completion_release_once() {
    let fx = fixture();
    let (rx, _sub) = fx.manager.subscribe();

    for _ in 0..100 {
        let id = fx.manager.play_sound("voice.mp3").unwrap();
        let player = fx.backend.last_player().unwrap();
        let barrier = Barrier::new(2);

        std::thread::scope(|s| {
            s.spawn(|| {
                barrier.wait();
                fx.manager.stop_sound(id);
            });
            s.spawn(|| {
                barrier.wait();
                player.complete_naturally();
            });
        });

        assert_eq!(player.release_count(), 1);
        assert!(!player.is_playing());
        assert!(!fx.manager.is_active(id));

        let terminal = drain(&rx)
            .into_iter()
            .filter(|e| e.is_terminal() && e.playback_id() == Some(id))
            .count();
        assert_eq!(terminal, 1);
    }
    assert_eq!(fx.manager.active_count(), 0);
}

#[test]
fn test_threaded_preparation_starts() {
    let fx = fixture_with(PrepareMode::Threaded, |_| {});
    let id = fx.manager.play_sound("samples/dog.mp3").unwrap();
    assert!(fx.manager.is_playing(id));
}

#[test]
fn test_malformed_media_fails_preparation() {
    let fx = fixture();
    let (rx, _sub) = fx.manager.subscribe();

    let err = fx.manager.play_sound("broken.mp3").unwrap_err();
    assert!(matches!(err, AudioError::PreparationFailed { ref identifier, .. } if identifier == "broken.mp3"));

    let player = fx.backend.last_player().unwrap();
    assert_eq!(player.release_count(), 1);
    assert_eq!(player.start_count(), 0);
    assert_eq!(fx.manager.active_count(), 0);
    assert!(drain(&rx)
        .iter()
        .any(|e| matches!(e, PlaybackEvent::Failed { id, .. } if *id == PlaybackId::new(0))));
}

#[test]
fn test_silent_player_is_torn_down() {
    let fx = fixture_with(PrepareMode::Silent, |_| {});
    let (rx, _sub) = fx.manager.subscribe();

    let err = fx.manager.play_sound("voice.mp3").unwrap_err();
    assert!(matches!(err, AudioError::PreparationFailed { ref identifier, .. } if identifier == "voice.mp3"));

    let player = fx.backend.last_player().unwrap();
    assert_eq!(fx.manager.active_count(), 0);
    assert_eq!(player.release_count(), 1);
    assert_eq!(player.start_count(), 0);
    assert!(drain(&rx)
        .iter()
        .any(|e| matches!(e, PlaybackEvent::Failed { id, .. } if *id == PlaybackId::new(0))));
}

#[test]
fn test_private_tier_stays_inside_private_dir() {
    let fx = fixture();
    // Both temp dirs share a parent, so this names an existing file
    let outside_name = fx.outside.path().file_name().unwrap().to_str().unwrap();
    let identifier = format!("../{}/abs.mp3", outside_name);
    assert!(fx.private.path().join(&identifier).exists());

    assert!(matches!(
        fx.manager.play_sound(&identifier),
        Err(AudioError::AssetNotFound(ref name)) if *name == identifier
    ));
    assert_eq!(fx.manager.active_count(), 0);
    assert!(fx.backend.players().is_empty());
}

#[test]
fn test_stop_while_preparing() {
    let fx = fixture_with(PrepareMode::Manual, |_| {});

    let pending = fx.manager.play_sound_async("voice.mp3").unwrap();
    let id = pending.id();
    assert!(fx.manager.is_active(id));
    assert!(!fx.manager.is_playing(id));
    assert!(pending.try_result().is_none());

    fx.manager.stop_sound(id);
    let player = fx.backend.last_player().unwrap();
    assert!(player.finish_prepare());

    assert!(matches!(pending.wait(), Err(AudioError::Stopped(stopped)) if stopped == id));
    assert_eq!(player.start_count(), 0);
    assert_eq!(player.release_count(), 1);
}

#[test]
fn test_manual_preparation_completes_pending() {
    let fx = fixture_with(PrepareMode::Manual, |_| {});

    let pending = fx.manager.play_sound_async("voice1.mp3").unwrap();
    let player = fx.backend.last_player().unwrap();

    let waiter = std::thread::spawn(move || pending.wait());
    std::thread::sleep(Duration::from_millis(20));
    player.finish_prepare();

    let id = waiter.join().unwrap().unwrap();
    assert!(fx.manager.is_playing(id));
}

#[test]
fn test_prepare_timeout_stops_sound() {
    let fx = fixture_with(PrepareMode::Manual, |config| {
        config.prepare_timeout_ms = Some(30);
    });

    let err = fx.manager.play_sound("voice.mp3").unwrap_err();
    assert!(matches!(err, AudioError::PrepareTimeout(id) if id == PlaybackId::new(0)));
    assert_eq!(fx.manager.active_count(), 0);

    // A late prepared notification must not start anything
    let player = fx.backend.last_player().unwrap();
    player.finish_prepare();
    assert_eq!(player.start_count(), 0);
    assert_eq!(player.release_count(), 1);
}

#[test]
fn test_close_releases_everything() {
    let fx = fixture();
    let (rx, _sub) = fx.manager.subscribe();

    fx.manager.play_sound("voice.mp3").unwrap();
    fx.manager.play_sound("samples/dog.mp3").unwrap();
    assert_eq!(fx.manager.active_count(), 2);

    fx.manager.close();

    assert_eq!(fx.manager.active_count(), 0);
    for player in fx.backend.players() {
        assert_eq!(player.release_count(), 1);
        assert!(!player.is_playing());
    }
    assert!(!fx.manager.effects().is_open());
    assert_eq!(fx.mixer.unload_count(), 1);
    assert!(drain(&rx).contains(&PlaybackEvent::PoolClosed));

    // Closed pool drops effects silently; reopening restores them
    fx.manager.play_sound_effect("cut.mp3");
    assert!(fx.mixer.triggers().is_empty());
    assert_eq!(fx.manager.open(), 3);
    fx.manager.play_sound_effect("cut.mp3");
    assert_eq!(fx.mixer.triggers().len(), 1);
}
