/// App-private file storage
///
/// Materializes audio (and other media) in the application's private
/// directory so the third resolution tier can find it, and removes files
/// that nothing references any more.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Byte storage keyed by file name
pub trait ByteStore: Send + Sync {
    fn read_bytes(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    fn write_bytes(&self, name: &str, data: &[u8]) -> Result<(), StorageError>;
}

/// Lookups answering whether a stored file is still in use.
///
/// Backed by the host's persistent store.
pub trait AssetReferenceIndex {
    /// Some saved project mentions `name`
    fn is_referenced_by_project(&self, name: &str) -> Result<bool, StorageError>;

    /// A user shape has checksum `name`
    fn is_user_shape(&self, name: &str) -> Result<bool, StorageError>;

    /// A user background has checksum `name`
    fn is_user_background(&self, name: &str) -> Result<bool, StorageError>;
}

/// A bare file name that stays inside the private directory
pub(crate) fn is_private_name(name: &str) -> bool {
    !(name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\'))
}

/// Outcome of [`clean_assets`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub kept: Vec<String>,
    pub deleted: Vec<String>,
}

/// Flat directory of private files
#[derive(Debug, Clone)]
pub struct PrivateFileStore {
    dir: PathBuf,
}

impl PrivateFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a name is stored at. Names may not leave the directory.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        if !is_private_name(name) {
            return Err(StorageError::Io {
                path: name.to_string(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "invalid file name"),
            });
        }
        Ok(self.dir.join(name))
    }

    /// Names of the files currently stored, sorted
    pub fn list(&self) -> Result<Vec<String>, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(&self.dir, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| self.io_error(&self.dir, e))?;
            let is_file = entry
                .file_type()
                .map(|t| t.is_file())
                .unwrap_or(false);
            if let (true, Some(name)) = (is_file, entry.file_name().to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn remove(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path_for(name)?;
        fs::remove_file(&path).map_err(|e| self.io_error(&path, e))
    }

    fn io_error(&self, path: &Path, source: io::Error) -> StorageError {
        StorageError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl ByteStore for PrivateFileStore {
    fn read_bytes(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(name)?;
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(name.to_string()),
            _ => self.io_error(&path, e),
        })
    }

    fn write_bytes(&self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.dir).map_err(|e| self.io_error(&self.dir, e))?;
        fs::write(&path, data).map_err(|e| self.io_error(&path, e))?;
        tracing::debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }
}

/// Delete private files of type `file_type` that no project, user shape or
/// user background refers to.
///
/// A failed lookup keeps the file.
pub fn clean_assets(
    store: &PrivateFileStore,
    file_type: &str,
    index: &dyn AssetReferenceIndex,
) -> Result<CleanReport, StorageError> {
    let suffix = format!(".{}", file_type.trim_start_matches('.'));
    tracing::info!("Cleaning files of type '{}'", file_type);

    let mut report = CleanReport::default();
    for name in store.list()? {
        if !name.ends_with(&suffix) {
            continue;
        }

        let referenced = index
            .is_referenced_by_project(&name)
            .and_then(|found| Ok(found || index.is_user_shape(&name)?))
            .and_then(|found| Ok(found || index.is_user_background(&name)?));

        match referenced {
            Ok(true) => report.kept.push(name),
            Ok(false) => {
                tracing::info!("Deleting because not found anywhere: {}", name);
                store.remove(&name)?;
                report.deleted.push(name);
            }
            Err(e) => {
                tracing::warn!("Keeping {}: {}", name, e);
                report.kept.push(name);
            }
        }
    }
    Ok(report)
}
