//! Filesystem disk.
//!
//! Files live under a root directory; storage paths map one-to-one onto
//! relative filesystem paths. Writes go to a temp file that is then renamed
//! into place, so readers never observe a half-written variant.

use super::{Storage, StorageError, join_url, validate_path};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct LocalDisk {
    root: PathBuf,
    base_url: String,
}

impl LocalDisk {
    /// The root is created lazily on first write.
    pub fn new(root: impl AsRef<Path>, base_url: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            base_url: base_url.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        validate_path(path)?;
        Ok(self.root.join(path))
    }

    fn temp_path(target: &Path) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}.{}.tmp", std::process::id(), n));
        target.with_file_name(name)
    }
}

impl Storage for LocalDisk {
    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.resolve(path)?.is_file())
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(path)?;
        fs::read(&full).map_err(|e| StorageError::io(path, e))
    }

    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(path, e))?;
        }

        let temp = Self::temp_path(&full);
        fs::write(&temp, bytes).map_err(|e| StorageError::io(path, e))?;
        if let Err(e) = fs::rename(&temp, &full) {
            let _ = fs::remove_file(&temp);
            return Err(StorageError::io(path, e));
        }

        tracing::debug!(path, size = bytes.len(), root = %self.root.display(), "Stored file");
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        match fs::remove_file(&full) {
            Ok(()) => {
                tracing::debug!(path, "Deleted file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    fn delete_directory(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        match fs::remove_dir_all(&full) {
            Ok(()) => {
                tracing::debug!(path, "Deleted directory");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    fn move_file(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        if !source.is_file() {
            return Err(StorageError::NotFound(from.to_string()));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(to, e))?;
        }
        fs::rename(&source, &target).map_err(|e| StorageError::io(from, e))?;
        tracing::debug!(from, to, "Moved file");
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}
