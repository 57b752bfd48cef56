use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use soundstage::{AppResult, AudioConfig, PlaybackEvent, SoundManager};

const LOG_TARGET_STARTUP: &str = "soundstage::startup";

/// Initialize tracing with file rotation
///
/// Logs are written to:
/// - macOS: ~/Library/Application Support/Soundstage/logs/
/// - Windows: %APPDATA%/Soundstage/logs/
/// - Linux: ~/.config/Soundstage/logs/
///
/// Log output:
/// - Debug builds: Console + File
/// - Release builds: File only
fn initialize_tracing() {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = dirs::config_dir()
        .map(|dir| dir.join("Soundstage").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "soundstage.log");

    // Info level unless RUST_LOG says otherwise
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true);

    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    tracing::info!(target: LOG_TARGET_STARTUP, "Log directory: {}", log_dir.display());
}

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    effects: Vec<String>,
    sounds: Vec<String>,
}

fn parse_args() -> AppResult<Args> {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().context("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--effect" => {
                let name = iter.next().context("--effect needs a name")?;
                args.effects.push(name);
            }
            flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
            _ => args.sounds.push(arg),
        }
    }

    if args.effects.is_empty() && args.sounds.is_empty() {
        bail!("Usage: soundstage [--config path] [--effect name]... [sound]...");
    }
    Ok(args)
}

fn main() -> AppResult<()> {
    initialize_tracing();

    let args = parse_args()?;
    let config_path = args.config.clone().unwrap_or_else(AudioConfig::default_path);
    let config = AudioConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    tracing::info!(target: LOG_TARGET_STARTUP, "Asset root: {}", config.asset_root.display());
    tracing::info!(target: LOG_TARGET_STARTUP, "Private files: {}", config.private_dir.display());

    let manager = SoundManager::with_rodio(config).context("Failed to open audio output")?;
    let (events, _subscriber) = manager.subscribe();

    for name in &args.effects {
        manager.play_sound_effect(name);
    }
    if !args.effects.is_empty() {
        // Effects are fire-and-forget; give the mixer time to drain them
        std::thread::sleep(Duration::from_millis(500));
    }

    let mut active = HashSet::new();
    for identifier in &args.sounds {
        match manager.play_sound(identifier) {
            Ok(id) if id.is_tracked() => {
                tracing::info!(
                    "Playing {} as {} ({} ms)",
                    identifier,
                    id,
                    manager.sound_duration(id)
                );
                active.insert(id);
            }
            Ok(_) => tracing::info!("Played {} through the effect pool", identifier),
            Err(e) => tracing::error!("Failed to play {}: {}", identifier, e),
        }
    }

    while !active.is_empty() {
        let event = match events.recv() {
            Ok(event) => event,
            Err(_) => break,
        };
        if event.is_terminal() {
            if let Some(id) = event.playback_id() {
                active.remove(&id);
            }
        }
        if matches!(event, PlaybackEvent::Failed { .. }) {
            tracing::warn!("{}", event.description());
        } else {
            tracing::debug!("{}", event.description());
        }
    }

    manager.close();
    Ok(())
}
