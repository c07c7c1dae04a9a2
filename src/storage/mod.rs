//! Named object-storage backends ("disks").
//!
//! Every file the library touches lives on a disk, addressed by a
//! `/`-separated path relative to that disk's root. A disk is anything that
//! implements [`Storage`]; the [`Disks`] registry maps the names used in
//! configuration and on media records to live backends.
//!
//! | Driver | Type | Notes |
//! |---|---|---|
//! | `local` | [`LocalDisk`] | Directory on the local filesystem, atomic writes |
//! | `memory` | [`MemoryDisk`] | Process-local map, used by tests and dry runs |

mod local;
mod memory;

pub use local::LocalDisk;
pub use memory::MemoryDisk;

use crate::config::{DiskConfig, DiskDriver};
use crate::error::MediaError;
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Invalid storage path: {0:?}")]
    InvalidPath(String),
    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(path.to_string())
        } else {
            StorageError::Io {
                path: path.to_string(),
                source,
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Object storage contract.
///
/// Implementations must be safe to call concurrently for different paths.
/// Concurrent writes to one path are last-writer-wins.
pub trait Storage: Send + Sync {
    fn exists(&self, path: &str) -> Result<bool, StorageError>;

    fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Write `bytes` at `path`, creating parents and replacing any existing file.
    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Write from a reader. Returns the number of bytes stored.
    fn put_stream(&self, path: &str, reader: &mut dyn Read) -> Result<u64, StorageError> {
        let mut buffer = Vec::new();
        reader
            .read_to_end(&mut buffer)
            .map_err(|e| StorageError::io(path, e))?;
        self.put(path, &buffer)?;
        Ok(buffer.len() as u64)
    }

    /// Delete a single file. Deleting a missing file is not an error.
    fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// Delete a directory and everything below it. A missing directory is not
    /// an error.
    fn delete_directory(&self, path: &str) -> Result<(), StorageError>;

    /// Move a file within this disk.
    fn move_file(&self, from: &str, to: &str) -> Result<(), StorageError>;

    /// Public URL for a path.
    fn url(&self, path: &str) -> String;
}

/// Reject absolute paths, empty paths and parent traversal.
pub(crate) fn validate_path(path: &str) -> Result<(), StorageError> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|segment| segment == ".." || segment.is_empty());
    if invalid {
        Err(StorageError::InvalidPath(path.to_string()))
    } else {
        Ok(())
    }
}

/// Join a base URL and a storage path with exactly one slash between them.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Registry of named disks.
#[derive(Clone, Default)]
pub struct Disks {
    disks: BTreeMap<String, Arc<dyn Storage>>,
}

impl Disks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every disk declared in configuration.
    pub fn from_config(config: &BTreeMap<String, DiskConfig>) -> Self {
        let mut disks = Self::new();
        for (name, disk) in config {
            let backend: Arc<dyn Storage> = match disk.driver {
                DiskDriver::Local => Arc::new(LocalDisk::new(&disk.root, &disk.url)),
                DiskDriver::Memory => Arc::new(MemoryDisk::new(&disk.url)),
            };
            disks.insert(name, backend);
        }
        disks
    }

    pub fn insert(&mut self, name: impl Into<String>, storage: Arc<dyn Storage>) {
        self.disks.insert(name.into(), storage);
    }

    pub fn with(mut self, name: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        self.insert(name, storage);
        self
    }

    /// Look up a disk. Unknown names are a configuration error, never defaulted.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Storage>, MediaError> {
        self.disks
            .get(name)
            .cloned()
            .ok_or_else(|| MediaError::DiskMisconfigured(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.disks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.disks.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Disks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.disks.keys()).finish()
    }
}
