//! In-memory disk.

use super::{Storage, StorageError, join_url, validate_path};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A disk backed by a sorted map of path → bytes.
///
/// Directories are implicit: a directory exists while some file path starts
/// with `dir/`.
#[derive(Default)]
pub struct MemoryDisk {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    base_url: String,
}

impl MemoryDisk {
    pub fn new(base_url: &str) -> Self {
        Self {
            files: Mutex::new(BTreeMap::new()),
            base_url: base_url.to_string(),
        }
    }

    fn files(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.files().keys().cloned().collect()
    }

    /// Stored paths under a directory prefix.
    pub fn paths_under(&self, dir: &str) -> Vec<String> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        self.files()
            .keys()
            .filter(|p| p.starts_with(&prefix))
            .cloned()
            .collect()
    }
}

impl Storage for MemoryDisk {
    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        validate_path(path)?;
        Ok(self.files().contains_key(path))
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        validate_path(path)?;
        self.files()
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        validate_path(path)?;
        self.files().insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        validate_path(path)?;
        self.files().remove(path);
        Ok(())
    }

    fn delete_directory(&self, path: &str) -> Result<(), StorageError> {
        validate_path(path)?;
        let prefix = format!("{}/", path);
        self.files().retain(|p, _| !p.starts_with(&prefix));
        Ok(())
    }

    fn move_file(&self, from: &str, to: &str) -> Result<(), StorageError> {
        validate_path(from)?;
        validate_path(to)?;
        let mut files = self.files();
        let bytes = files
            .remove(from)
            .ok_or_else(|| StorageError::NotFound(from.to_string()))?;
        files.insert(to.to_string(), bytes);
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}
