/// Asset tier resolution
///
/// Maps a requested identifier onto one of three storage tiers and opens it.
use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::AudioConfig;
use crate::error::AudioError;
use crate::storage::is_private_name;

use super::source::{AssetLocation, SourceHandle};

/// An open asset descriptor: a file plus the byte range the asset occupies in it
#[derive(Debug)]
pub struct AssetFd {
    pub file: File,
    pub start_offset: u64,
    pub length: u64,
}

/// Read-only asset bundle shipped with the application.
///
/// Paths are `/`-separated and relative to the bundle root. A packed archive
/// can report a non-zero `start_offset` into a shared file.
pub trait AssetBundle: Send + Sync {
    /// File names directly inside `dir`. A missing directory lists as empty.
    fn list(&self, dir: &str) -> io::Result<Vec<String>>;

    fn open(&self, path: &str) -> io::Result<AssetFd>;

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        let fd = self.open(path)?;
        let handle = SourceHandle::new(
            path,
            AssetLocation::BundledAsset(path.to_string()),
            fd.file,
            fd.start_offset,
            fd.length,
        );
        handle.reader()?.read_to_vec()
    }
}

/// Asset bundle backed by a plain directory tree
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    root: PathBuf,
}

impl DirectoryBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, rel: &str) -> PathBuf {
        rel.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }
}

impl AssetBundle for DirectoryBundle {
    fn list(&self, dir: &str) -> io::Result<Vec<String>> {
        let entries = match fs::read_dir(self.path_of(dir)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn open(&self, path: &str) -> io::Result<AssetFd> {
        let file = File::open(self.path_of(path))?;
        let meta = file.metadata()?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("not a file: {}", path),
            ));
        }
        Ok(AssetFd {
            file,
            start_offset: 0,
            length: meta.len(),
        })
    }
}

/// Join a bundle-relative directory and a name
pub(crate) fn bundle_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Decides which tier holds an identifier and opens it
pub struct AssetResolver {
    bundle: Arc<dyn AssetBundle>,
    audio_dir: String,
    private_dir: PathBuf,
    bundled: HashSet<String>,
}

impl AssetResolver {
    /// Build the resolver, listing the bundle's audio directory and its
    /// samples subdirectory once.
    pub fn new(
        bundle: Arc<dyn AssetBundle>,
        audio_dir: impl Into<String>,
        samples_dir: &str,
        private_dir: impl Into<PathBuf>,
    ) -> Self {
        let audio_dir = audio_dir.into();
        let mut bundled = HashSet::new();

        match bundle.list(&audio_dir) {
            Ok(names) => bundled.extend(names),
            Err(e) => tracing::warn!("Failed to list bundled audio in '{}': {}", audio_dir, e),
        }

        let samples_path = bundle_path(&audio_dir, samples_dir);
        match bundle.list(&samples_path) {
            Ok(names) => bundled.extend(names.into_iter().map(|n| bundle_path(samples_dir, &n))),
            Err(e) => tracing::warn!("Failed to list bundled samples in '{}': {}", samples_path, e),
        }

        tracing::info!("Indexed {} bundled audio assets", bundled.len());

        Self {
            bundle,
            audio_dir,
            private_dir: private_dir.into(),
            bundled,
        }
    }

    pub fn from_config(config: &AudioConfig, bundle: Arc<dyn AssetBundle>) -> Self {
        Self::new(
            bundle,
            config.audio_dir.clone(),
            &config.samples_dir,
            config.private_dir.clone(),
        )
    }

    pub fn is_bundled(&self, identifier: &str) -> bool {
        self.bundled.contains(identifier)
    }

    pub fn bundled_count(&self) -> usize {
        self.bundled.len()
    }

    pub fn private_dir(&self) -> &Path {
        &self.private_dir
    }

    /// Pick the tier for an identifier without touching storage
    pub fn locate(&self, identifier: &str) -> AssetLocation {
        if identifier.starts_with('/') || identifier.starts_with(std::path::MAIN_SEPARATOR) {
            AssetLocation::Absolute(PathBuf::from(identifier))
        } else if self.bundled.contains(identifier) {
            AssetLocation::BundledAsset(identifier.to_string())
        } else {
            AssetLocation::AppPrivateFile(identifier.to_string())
        }
    }

    /// Resolve and open the source for an identifier
    pub fn resolve(&self, identifier: &str) -> Result<SourceHandle, AudioError> {
        if identifier.is_empty() {
            return Err(AudioError::AssetNotFound(identifier.to_string()));
        }

        let location = self.locate(identifier);
        let (file, start_offset, length) = match &location {
            AssetLocation::Absolute(path) => open_plain(identifier, path)?,
            AssetLocation::BundledAsset(rel) => {
                let path = bundle_path(&self.audio_dir, rel);
                let fd = self
                    .bundle
                    .open(&path)
                    .map_err(|e| AudioError::from_open(identifier, Path::new(&path), e))?;
                (fd.file, fd.start_offset, fd.length)
            }
            AssetLocation::AppPrivateFile(rel) => {
                if !is_private_name(rel) {
                    return Err(AudioError::AssetNotFound(identifier.to_string()));
                }
                open_plain(identifier, &self.private_dir.join(rel))?
            }
        };

        tracing::debug!(
            "Resolved '{}' to {} ({} bytes at offset {})",
            identifier,
            location,
            length,
            start_offset
        );

        Ok(SourceHandle::new(identifier, location, file, start_offset, length))
    }
}

fn open_plain(identifier: &str, path: &Path) -> Result<(File, u64, u64), AudioError> {
    let file = File::open(path).map_err(|e| AudioError::from_open(identifier, path, e))?;
    let meta = file
        .metadata()
        .map_err(|e| AudioError::from_open(identifier, path, e))?;
    if !meta.is_file() {
        return Err(AudioError::AssetNotFound(identifier.to_string()));
    }
    Ok((file, 0, meta.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, tempfile::TempDir, AssetResolver) {
        let bundle_dir = tempfile::tempdir().unwrap();
        let private_dir = tempfile::tempdir().unwrap();

        let audio = bundle_dir.path().join("HTML5");
        fs::create_dir_all(audio.join("samples")).unwrap();
        fs::create_dir_all(audio.join("sounds")).unwrap();
        fs::write(audio.join("cut.wav"), b"bundled-cut").unwrap();
        fs::write(audio.join("samples").join("dog.wav"), b"woof").unwrap();
        fs::write(private_dir.path().join("voice1.wav"), b"private-voice").unwrap();

        let bundle = Arc::new(DirectoryBundle::new(bundle_dir.path()));
        let resolver = AssetResolver::new(bundle, "HTML5", "samples", private_dir.path());
        (bundle_dir, private_dir, resolver)
    }

    #[test]
    fn test_membership_includes_samples_prefix() {
        let (_b, _p, resolver) = fixture();
        assert!(resolver.is_bundled("cut.wav"));
        assert!(resolver.is_bundled("samples/dog.wav"));
        assert!(!resolver.is_bundled("dog.wav"));
        // Subdirectories are not members themselves
        assert!(!resolver.is_bundled("sounds"));
    }

    #[test]
    fn test_tier_rule() {
        let (_b, _p, resolver) = fixture();
        assert_eq!(
            resolver.locate("/cut.wav"),
            AssetLocation::Absolute(PathBuf::from("/cut.wav"))
        );
        assert_eq!(
            resolver.locate("cut.wav"),
            AssetLocation::BundledAsset("cut.wav".into())
        );
        assert_eq!(
            resolver.locate("voice1.wav"),
            AssetLocation::AppPrivateFile("voice1.wav".into())
        );
    }

    #[test]
    fn test_resolve_each_tier() {
        let (b, p, resolver) = fixture();

        let bundled = resolver.resolve("samples/dog.wav").unwrap();
        assert_eq!(bundled.byte_length(), 4);
        assert_eq!(bundled.reader().unwrap().read_to_vec().unwrap(), b"woof");

        let private = resolver.resolve("voice1.wav").unwrap();
        assert_eq!(private.location().tier(), "private");
        assert_eq!(private.byte_length(), 13);

        let abs_path = b.path().join("HTML5").join("cut.wav");
        let absolute = resolver.resolve(abs_path.to_str().unwrap()).unwrap();
        assert_eq!(absolute.location(), &AssetLocation::Absolute(abs_path));
        assert_eq!(absolute.start_offset(), 0);

        drop(p);
    }

    #[test]
    fn test_missing_is_asset_not_found() {
        let (_b, _p, resolver) = fixture();
        assert!(matches!(
            resolver.resolve("missing.mp3"),
            Err(AudioError::AssetNotFound(_))
        ));
        assert!(matches!(
            resolver.resolve("/definitely/not/here.mp3"),
            Err(AudioError::AssetNotFound(_))
        ));
        assert!(matches!(resolver.resolve(""), Err(AudioError::AssetNotFound(_))));
    }

    #[test]
    fn test_private_names_cannot_escape() {
        let (_b, p, resolver) = fixture();
        let nested = p.path().join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("take.wav"), b"x").unwrap();

        for identifier in ["../voice1.wav", "nested/take.wav", "..", "."] {
            assert!(
                matches!(resolver.resolve(identifier), Err(AudioError::AssetNotFound(_))),
                "{} should not resolve",
                identifier
            );
        }
    }

    #[test]
    fn test_missing_bundle_dir_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = DirectoryBundle::new(dir.path());
        assert!(bundle.list("HTML5/sounds").unwrap().is_empty());
    }

    #[test]
    fn test_bundle_path_join() {
        assert_eq!(bundle_path("HTML5", "pop.mp3"), "HTML5/pop.mp3");
        assert_eq!(bundle_path("HTML5/", "a"), "HTML5/a");
        assert_eq!(bundle_path("", "a"), "a");
    }
}
