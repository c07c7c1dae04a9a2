//! Shared test utilities.
//!
//! Fixtures for records and stored originals, plus storage and queue
//! doubles that record what the pipeline did to them.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let ctx = TestContext::new();
//! let media = ctx.stored_image("photo.jpg");
//! assert!(ctx.disk.exists(&media.original_path(APP_KEY)).unwrap());
//! ```

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use image::{DynamicImage, RgbImage};
use serde_json::Map;

use crate::format::{self, ImageFormat};
use crate::media::{MediaId, MediaItem};
use crate::queue::{QueueError, Task, TaskQueue};
use crate::collections::{CollectionId, MediaCollection};
use crate::records::{JsonRecordStore, MediaDraft, MediaFilter, RecordError, RecordStore};
use crate::storage::{Disks, MemoryDisk, Storage, StorageError};

pub const APP_KEY: &str = "test-app-key";

// =========================================================================
// Fixtures
// =========================================================================

/// A real JPEG of the given size with a simple gradient.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let pixels = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(pixels)
        .write_to(&mut bytes, image::ImageFormat::Jpeg)
        .unwrap();
    bytes.into_inner()
}

fn mime_for(file_name: &str) -> String {
    format::file_extension(file_name)
        .and_then(ImageFormat::from_extension)
        .map(|f| f.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// A record on the `public` disk that is not in any store.
pub fn media_item(id: u64, file_name: &str, mime_type: &str) -> MediaItem {
    MediaItem {
        id: MediaId(id),
        name: format::file_stem(file_name).to_string(),
        file_name: file_name.to_string(),
        mime_type: mime_type.to_string(),
        size_bytes: 1024,
        disk: "public".to_string(),
        custom_properties: Map::new(),
    }
}

pub fn draft(file_name: &str, mime_type: &str) -> MediaDraft {
    MediaDraft {
        name: format::file_stem(file_name).to_string(),
        file_name: file_name.to_string(),
        mime_type: mime_type.to_string(),
        size_bytes: 1024,
        disk: "public".to_string(),
        custom_properties: Map::new(),
    }
}

/// An in-memory `public` disk (served under `/storage`) and record store.
pub struct TestContext {
    pub disk: Arc<MemoryDisk>,
    pub disks: Disks,
    pub records: Arc<JsonRecordStore>,
}

impl TestContext {
    pub fn new() -> Self {
        let disk = Arc::new(MemoryDisk::new("/storage"));
        let disks = Disks::new().with("public", disk.clone());
        Self {
            disk,
            disks,
            records: Arc::new(JsonRecordStore::in_memory()),
        }
    }

    /// Create a record for `file_name` and store a 64×48 JPEG as its original.
    pub fn stored_image(&self, file_name: &str) -> MediaItem {
        self.stored_file(file_name, &mime_for(file_name), &jpeg_bytes(64, 48))
    }

    pub fn stored_file(&self, file_name: &str, mime_type: &str, bytes: &[u8]) -> MediaItem {
        let mut draft = draft(file_name, mime_type);
        draft.size_bytes = bytes.len() as u64;
        let media = self.records.create(draft).unwrap();
        self.disk.put(&media.original_path(APP_KEY), bytes).unwrap();
        media
    }
}

// =========================================================================
// Storage doubles
// =========================================================================

/// Delegates to a [`MemoryDisk`] and counts writes per path.
pub struct CountingDisk {
    inner: Arc<MemoryDisk>,
    puts: Mutex<HashMap<String, usize>>,
}

impl CountingDisk {
    pub fn new(inner: Arc<MemoryDisk>) -> Self {
        Self {
            inner,
            puts: Mutex::new(HashMap::new()),
        }
    }

    pub fn puts(&self, path: &str) -> usize {
        self.puts.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

impl Storage for CountingDisk {
    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        self.inner.exists(path)
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.get(path)
    }

    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        *self.puts.lock().unwrap().entry(path.to_string()).or_default() += 1;
        self.inner.put(path, bytes)
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.inner.delete(path)
    }

    fn delete_directory(&self, path: &str) -> Result<(), StorageError> {
        self.inner.delete_directory(path)
    }

    fn move_file(&self, from: &str, to: &str) -> Result<(), StorageError> {
        self.inner.move_file(from, to)
    }

    fn url(&self, path: &str) -> String {
        self.inner.url(path)
    }
}

/// A disk whose directory deletes and writes can be made to fail.
pub struct FaultyDisk {
    inner: Arc<MemoryDisk>,
    pub fail_directory_delete: bool,
    pub fail_put: bool,
}

impl FaultyDisk {
    pub fn new(inner: Arc<MemoryDisk>) -> Self {
        Self {
            inner,
            fail_directory_delete: false,
            fail_put: false,
        }
    }

    fn failure(path: &str) -> StorageError {
        StorageError::Io {
            path: path.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        }
    }
}

impl Storage for FaultyDisk {
    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        self.inner.exists(path)
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.get(path)
    }

    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if self.fail_put {
            return Err(Self::failure(path));
        }
        self.inner.put(path, bytes)
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.inner.delete(path)
    }

    fn delete_directory(&self, path: &str) -> Result<(), StorageError> {
        if self.fail_directory_delete {
            return Err(Self::failure(path));
        }
        self.inner.delete_directory(path)
    }

    fn move_file(&self, from: &str, to: &str) -> Result<(), StorageError> {
        self.inner.move_file(from, to)
    }

    fn url(&self, path: &str) -> String {
        self.inner.url(path)
    }
}

// =========================================================================
// Record store double
// =========================================================================

/// A record store whose saves can be made to fail.
pub struct FaultyRecords {
    inner: Arc<JsonRecordStore>,
    pub fail_save: bool,
}

impl FaultyRecords {
    pub fn new(inner: Arc<JsonRecordStore>) -> Self {
        Self {
            inner,
            fail_save: false,
        }
    }
}

impl RecordStore for FaultyRecords {
    fn create(&self, draft: MediaDraft) -> Result<MediaItem, RecordError> {
        self.inner.create(draft)
    }

    fn load(&self, id: MediaId) -> Result<MediaItem, RecordError> {
        self.inner.load(id)
    }

    fn save(&self, media: &MediaItem) -> Result<(), RecordError> {
        if self.fail_save {
            return Err(RecordError::Io(std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                "no space left",
            )));
        }
        self.inner.save(media)
    }

    fn delete(&self, id: MediaId) -> Result<(), RecordError> {
        self.inner.delete(id)
    }

    fn query(&self, filter: &MediaFilter) -> Result<Vec<MediaItem>, RecordError> {
        self.inner.query(filter)
    }

    fn create_collection(&self, name: &str) -> Result<MediaCollection, RecordError> {
        self.inner.create_collection(name)
    }

    fn collections(&self) -> Result<Vec<MediaCollection>, RecordError> {
        self.inner.collections()
    }

    fn collections_of(&self, media: MediaId) -> Result<Vec<CollectionId>, RecordError> {
        self.inner.collections_of(media)
    }

    fn attach(&self, media: MediaId, collections: &[CollectionId]) -> Result<usize, RecordError> {
        self.inner.attach(media, collections)
    }

    fn detach(&self, media: MediaId, collections: &[CollectionId]) -> Result<usize, RecordError> {
        self.inner.detach(media, collections)
    }
}

// =========================================================================
// Queue double
// =========================================================================

/// Collects enqueued tasks without running them.
#[derive(Default)]
pub struct MemoryQueue {
    tasks: Mutex<Vec<Task>>,
}

impl MemoryQueue {
    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().unwrap().clone()
    }
}

impl TaskQueue for MemoryQueue {
    fn enqueue(&self, task: Task) -> Result<(), QueueError> {
        // Round-trip through the payload so tests see what a real queue stores
        let task = Task::from_payload(&task.to_payload()?)?;
        self.tasks.lock().unwrap().push(task);
        Ok(())
    }
}
