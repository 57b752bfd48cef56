use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

fn default_asset_root() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("assets")))
        .unwrap_or_else(|| PathBuf::from("assets"))
}

fn default_private_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("Soundstage").join("files"))
        .unwrap_or_else(|| PathBuf::from("files"))
}

fn default_pool_names() -> Vec<String> {
    vec!["pop.mp3".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Root of the read-only asset bundle
    pub asset_root: PathBuf,

    /// Bundle directory holding playable audio, relative to `asset_root`
    pub audio_dir: String,

    /// Subdirectory of `audio_dir` whose files are preloaded as sound effects
    pub sounds_dir: String,

    /// Subdirectory of `audio_dir` indexed as `samples/<name>` for long-form playback
    pub samples_dir: String,

    /// Application-private writable directory (third resolution tier)
    pub private_dir: PathBuf,

    /// Identifiers that always play through the sound effect pool
    #[serde(default = "default_pool_names")]
    pub redirect_to_pool: Vec<String>,

    /// Effects loaded from `audio_dir` itself in addition to `sounds_dir`
    #[serde(default = "default_pool_names")]
    pub extra_effects: Vec<String>,

    /// Bound on waiting for a long-form sound to start. None waits forever.
    #[serde(default)]
    pub prepare_timeout_ms: Option<u64>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            asset_root: default_asset_root(),
            audio_dir: "HTML5".to_string(),
            sounds_dir: "sounds".to_string(),
            samples_dir: "samples".to_string(),
            private_dir: default_private_dir(),
            redirect_to_pool: default_pool_names(),
            extra_effects: default_pool_names(),
            prepare_timeout_ms: None,
        }
    }
}

impl AudioConfig {
    /// Config rooted at explicit bundle and private directories, other fields default
    pub fn with_dirs(asset_root: impl Into<PathBuf>, private_dir: impl Into<PathBuf>) -> Self {
        Self {
            asset_root: asset_root.into(),
            private_dir: private_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from `path`.
    /// Creates and saves a default config if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
            let config: AudioConfig =
                serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.display().to_string(),
                    source: Box::new(e),
                })?;
            config.validate()?;

            tracing::info!("✓ Loaded config from: {}", path.display());
            Ok(config)
        } else {
            let config = AudioConfig::default();
            config.save(path)?;
            tracing::info!("✓ Created default config at: {}", path.display());
            Ok(config)
        }
    }

    /// Save configuration to disk
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        fs::write(path, json).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        Ok(())
    }

    /// Platform config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("Soundstage"))
            .unwrap_or_else(|| PathBuf::from("config"))
            .join("config.json")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audio_dir.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "audio_dir must be relative to the bundle root, got '{}'",
                self.audio_dir
            )));
        }
        if self.sounds_dir.is_empty() || self.samples_dir.is_empty() {
            return Err(ConfigError::Invalid(
                "sounds_dir and samples_dir must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn prepare_timeout(&self) -> Option<std::time::Duration> {
        self.prepare_timeout_ms.map(std::time::Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AudioConfig::default();
        assert_eq!(config.audio_dir, "HTML5");
        assert_eq!(config.sounds_dir, "sounds");
        assert_eq!(config.samples_dir, "samples");
        assert_eq!(config.redirect_to_pool, vec!["pop.mp3".to_string()]);
        assert_eq!(config.extra_effects, vec!["pop.mp3".to_string()]);
        assert!(config.prepare_timeout().is_none());
    }

    #[test]
    fn test_load_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = AudioConfig::load(&path).unwrap();
        assert!(path.exists());

        let reloaded = AudioConfig::load(&path).unwrap();
        assert_eq!(config.audio_dir, reloaded.audio_dir);
        assert_eq!(config.private_dir, reloaded.private_dir);
    }

    #[test]
    fn test_missing_optional_fields_use_defaults() {
        let json = r#"{
            "asset_root": "/opt/app/assets",
            "audio_dir": "HTML5",
            "sounds_dir": "sounds",
            "samples_dir": "samples",
            "private_dir": "/tmp/files"
        }"#;
        let config: AudioConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.redirect_to_pool, vec!["pop.mp3".to_string()]);
        assert_eq!(config.prepare_timeout_ms, None);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AudioConfig::with_dirs("/a", "/b");
        config.audio_dir = "/HTML5".to_string();
        config.save(&path).unwrap();

        assert!(matches!(
            AudioConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
    }
}
