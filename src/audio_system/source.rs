/// Resolved audio sources
///
/// Describes where a long-form sound lives and owns the open descriptor
/// until the playback that uses it is torn down.
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// Storage tier a requested identifier resolved to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetLocation {
    /// Identifier started with a path separator
    Absolute(PathBuf),

    /// Read-only asset shipped in the bundle, relative to the audio directory
    BundledAsset(String),

    /// Writable file in the application's private directory
    AppPrivateFile(String),
}

impl AssetLocation {
    /// Short tier name used in logs and events
    pub fn tier(&self) -> &'static str {
        match self {
            AssetLocation::Absolute(_) => "absolute",
            AssetLocation::BundledAsset(_) => "bundled",
            AssetLocation::AppPrivateFile(_) => "private",
        }
    }
}

impl fmt::Display for AssetLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetLocation::Absolute(path) => write!(f, "absolute:{}", path.display()),
            AssetLocation::BundledAsset(rel) => write!(f, "bundled:{}", rel),
            AssetLocation::AppPrivateFile(rel) => write!(f, "private:{}", rel),
        }
    }
}

/// Deferred cleanup for a resolved source.
///
/// Runs at most once: `run` takes the action, and dropping an unrun release
/// runs it so a descriptor is never leaked on an early-return path.
pub struct SourceRelease {
    action: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl SourceRelease {
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            action: Mutex::new(Some(Box::new(action))),
        }
    }

    /// A release with nothing to clean up
    pub fn noop() -> Self {
        Self {
            action: Mutex::new(None),
        }
    }

    /// Run the cleanup. Returns false if it already ran.
    pub fn run(&self) -> bool {
        let action = self.action.lock().take();
        match action {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.action.lock().is_some()
    }
}

impl Drop for SourceRelease {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for SourceRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRelease")
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// An open, readable byte range for one long-form sound
#[derive(Debug)]
pub struct SourceHandle {
    identifier: String,
    location: AssetLocation,
    file: File,
    start_offset: u64,
    length: u64,
}

impl SourceHandle {
    pub fn new(
        identifier: impl Into<String>,
        location: AssetLocation,
        file: File,
        start_offset: u64,
        length: u64,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            location,
            file,
            start_offset,
            length,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn location(&self) -> &AssetLocation {
        &self.location
    }

    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    pub fn byte_length(&self) -> u64 {
        self.length
    }

    /// Independent reader over the same byte range, for the player to consume
    pub fn reader(&self) -> io::Result<SourceReader> {
        Ok(SourceReader {
            identifier: self.identifier.clone(),
            file: self.file.try_clone()?,
            start_offset: self.start_offset,
            length: self.length,
        })
    }

    /// Split off the release action; the descriptor closes when it runs
    pub fn into_release(self) -> SourceRelease {
        let SourceHandle {
            identifier,
            location,
            file,
            ..
        } = self;
        SourceRelease::new(move || {
            drop(file);
            tracing::debug!("Closed {} source for '{}'", location.tier(), identifier);
        })
    }
}

/// Owned reader handed to a media player
#[derive(Debug)]
pub struct SourceReader {
    identifier: String,
    file: File,
    start_offset: u64,
    length: u64,
}

impl SourceReader {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn byte_length(&self) -> u64 {
        self.length
    }

    /// File extension of the identifier, used as a format hint
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.identifier)
            .extension()
            .and_then(|ext| ext.to_str())
    }

    /// Read the whole byte range into memory
    pub fn read_to_vec(&mut self) -> io::Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(self.start_offset))?;
        let mut data = Vec::with_capacity(self.length as usize);
        (&mut self.file).take(self.length).read_to_end(&mut data)?;
        if (data.len() as u64) < self.length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "expected {} bytes from '{}', got {}",
                    self.length,
                    self.identifier,
                    data.len()
                ),
            ));
        }
        Ok(data)
    }
}
