//! Media record store.
//!
//! The pipeline only needs get/put access to records plus a filtered
//! enumeration for batch administration, so the store is a small trait.
//! [`JsonRecordStore`] keeps everything in one versioned JSON document:
//!
//! ```json
//! {
//!   "version": 1,
//!   "next_media_id": 3,
//!   "next_collection_id": 2,
//!   "media": { "1": { "id": 1, "file_name": "photo.jpg", ... } },
//!   "collections": { "1": { "id": 1, "name": "Default" } },
//!   "memberships": { "1": [1] }
//! }
//! ```
//!
//! Every mutation rewrites the document through a temp file and a rename,
//! so a crash never leaves a truncated store behind. Without a path the
//! store is purely in memory.

use crate::collections::{CollectionId, MediaCollection};
use crate::media::{MediaId, MediaItem};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Version of the store format.
const STORE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Media {0} not found")]
    NotFound(MediaId),
    #[error("Collection {0} not found")]
    CollectionNotFound(String),
    #[error("Collection `{0}` already exists")]
    DuplicateCollection(String),
    #[error("Unsupported record store version {found}")]
    UnsupportedVersion { found: u32 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fields of a record that does not have an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaDraft {
    pub name: String,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub disk: String,
    pub custom_properties: Map<String, Value>,
}

/// Filter for batch enumeration. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaFilter {
    /// MIME type prefix, e.g. `"image/"`.
    pub mime_prefix: Option<String>,
    /// Collection name the media must belong to.
    pub collection: Option<String>,
    pub ids: Option<Vec<MediaId>>,
    /// Require the responsive manifest to be present (`true`) or absent (`false`).
    pub has_manifest: Option<bool>,
}

impl MediaFilter {
    pub fn images() -> Self {
        Self {
            mime_prefix: Some("image/".to_string()),
            ..Self::default()
        }
    }

    pub fn in_collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    pub fn with_ids(mut self, ids: impl Into<Vec<MediaId>>) -> Self {
        self.ids = Some(ids.into());
        self
    }

    pub fn with_manifest(mut self, present: bool) -> Self {
        self.has_manifest = Some(present);
        self
    }

    fn matches_item(&self, media: &MediaItem) -> bool {
        self.mime_prefix
            .as_deref()
            .is_none_or(|prefix| media.mime_type.starts_with(prefix))
            && self.ids.as_ref().is_none_or(|ids| ids.contains(&media.id))
            && self
                .has_manifest
                .is_none_or(|present| media.has_responsive_images() == present)
    }
}

pub trait RecordStore: Send + Sync {
    fn create(&self, draft: MediaDraft) -> Result<MediaItem, RecordError>;

    fn load(&self, id: MediaId) -> Result<MediaItem, RecordError>;

    /// Replace the stored record with `media`.
    fn save(&self, media: &MediaItem) -> Result<(), RecordError>;

    /// Remove the record and its collection memberships.
    fn delete(&self, id: MediaId) -> Result<(), RecordError>;

    /// Matching records, ordered by id.
    fn query(&self, filter: &MediaFilter) -> Result<Vec<MediaItem>, RecordError>;

    fn create_collection(&self, name: &str) -> Result<MediaCollection, RecordError>;

    fn collections(&self) -> Result<Vec<MediaCollection>, RecordError>;

    /// Membership of `media`, ordered by collection id.
    fn collections_of(&self, media: MediaId) -> Result<Vec<CollectionId>, RecordError>;

    /// Add memberships. Returns how many were new.
    fn attach(&self, media: MediaId, collections: &[CollectionId]) -> Result<usize, RecordError>;

    /// Remove memberships. Returns how many were removed.
    fn detach(&self, media: MediaId, collections: &[CollectionId]) -> Result<usize, RecordError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    next_media_id: u64,
    next_collection_id: u64,
    #[serde(default)]
    media: BTreeMap<u64, MediaItem>,
    #[serde(default)]
    collections: BTreeMap<u64, MediaCollection>,
    #[serde(default)]
    memberships: BTreeMap<u64, BTreeSet<u64>>,
}

impl StoreDocument {
    fn empty() -> Self {
        Self {
            version: STORE_VERSION,
            next_media_id: 1,
            next_collection_id: 1,
            media: BTreeMap::new(),
            collections: BTreeMap::new(),
            memberships: BTreeMap::new(),
        }
    }

    fn in_collection(&self, media: MediaId, name: &str) -> bool {
        let Some(collection) = self.collections.values().find(|c| c.name == name) else {
            return false;
        };
        self.memberships
            .get(&media.0)
            .is_some_and(|set| set.contains(&collection.id.0))
    }
}

/// JSON-file record store.
pub struct JsonRecordStore {
    path: Option<PathBuf>,
    document: Mutex<StoreDocument>,
}

impl JsonRecordStore {
    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            document: Mutex::new(StoreDocument::empty()),
        }
    }

    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let path = path.as_ref().to_path_buf();
        let document = match std::fs::read_to_string(&path) {
            Ok(content) => {
                let document: StoreDocument = serde_json::from_str(&content)?;
                if document.version != STORE_VERSION {
                    return Err(RecordError::UnsupportedVersion {
                        found: document.version,
                    });
                }
                document
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreDocument::empty(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), media = document.media.len(), "Opened record store");
        Ok(Self {
            path: Some(path),
            document: Mutex::new(document),
        })
    }

    fn document(&self) -> MutexGuard<'_, StoreDocument> {
        self.document.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` and persist the result. If persisting fails the
    /// in-memory document is rolled back.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut StoreDocument) -> Result<T, RecordError>,
    ) -> Result<T, RecordError> {
        let mut document = self.document();
        let backup = self.path.as_ref().map(|_| document.clone());
        let result = change(&mut document)?;
        if let Some(path) = &self.path
            && let Err(e) = persist(path, &document)
        {
            if let Some(backup) = backup {
                *document = backup;
            }
            return Err(e);
        }
        Ok(result)
    }
}

fn persist(path: &Path, document: &StoreDocument) -> Result<(), RecordError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(document)?;
    let temp = path.with_extension("json.tmp");
    std::fs::write(&temp, json)?;
    std::fs::rename(&temp, path)?;
    Ok(())
}

impl RecordStore for JsonRecordStore {
    fn create(&self, draft: MediaDraft) -> Result<MediaItem, RecordError> {
        self.mutate(|doc| {
            let id = MediaId(doc.next_media_id);
            doc.next_media_id += 1;
            let media = MediaItem {
                id,
                name: draft.name,
                file_name: draft.file_name,
                mime_type: draft.mime_type,
                size_bytes: draft.size_bytes,
                disk: draft.disk,
                custom_properties: draft.custom_properties,
            };
            doc.media.insert(id.0, media.clone());
            Ok(media)
        })
    }

    fn load(&self, id: MediaId) -> Result<MediaItem, RecordError> {
        self.document()
            .media
            .get(&id.0)
            .cloned()
            .ok_or(RecordError::NotFound(id))
    }

    fn save(&self, media: &MediaItem) -> Result<(), RecordError> {
        self.mutate(|doc| {
            let slot = doc
                .media
                .get_mut(&media.id.0)
                .ok_or(RecordError::NotFound(media.id))?;
            *slot = media.clone();
            Ok(())
        })
    }

    fn delete(&self, id: MediaId) -> Result<(), RecordError> {
        self.mutate(|doc| {
            doc.media.remove(&id.0).ok_or(RecordError::NotFound(id))?;
            doc.memberships.remove(&id.0);
            Ok(())
        })
    }

    fn query(&self, filter: &MediaFilter) -> Result<Vec<MediaItem>, RecordError> {
        let doc = self.document();
        Ok(doc
            .media
            .values()
            .filter(|m| filter.matches_item(m))
            .filter(|m| {
                filter
                    .collection
                    .as_deref()
                    .is_none_or(|name| doc.in_collection(m.id, name))
            })
            .cloned()
            .collect())
    }

    fn create_collection(&self, name: &str) -> Result<MediaCollection, RecordError> {
        self.mutate(|doc| {
            if doc.collections.values().any(|c| c.name == name) {
                return Err(RecordError::DuplicateCollection(name.to_string()));
            }
            let collection = MediaCollection {
                id: CollectionId(doc.next_collection_id),
                name: name.to_string(),
            };
            doc.next_collection_id += 1;
            doc.collections.insert(collection.id.0, collection.clone());
            Ok(collection)
        })
    }

    fn collections(&self) -> Result<Vec<MediaCollection>, RecordError> {
        Ok(self.document().collections.values().cloned().collect())
    }

    fn collections_of(&self, media: MediaId) -> Result<Vec<CollectionId>, RecordError> {
        let doc = self.document();
        if !doc.media.contains_key(&media.0) {
            return Err(RecordError::NotFound(media));
        }
        Ok(doc
            .memberships
            .get(&media.0)
            .map(|set| set.iter().map(|&id| CollectionId(id)).collect())
            .unwrap_or_default())
    }

    fn attach(&self, media: MediaId, collections: &[CollectionId]) -> Result<usize, RecordError> {
        self.mutate(|doc| {
            if !doc.media.contains_key(&media.0) {
                return Err(RecordError::NotFound(media));
            }
            if let Some(missing) = collections.iter().find(|c| !doc.collections.contains_key(&c.0)) {
                return Err(RecordError::CollectionNotFound(missing.to_string()));
            }
            let set = doc.memberships.entry(media.0).or_default();
            Ok(collections.iter().filter(|c| set.insert(c.0)).count())
        })
    }

    fn detach(&self, media: MediaId, collections: &[CollectionId]) -> Result<usize, RecordError> {
        self.mutate(|doc| {
            let Some(set) = doc.memberships.get_mut(&media.0) else {
                return Ok(0);
            };
            let removed = collections.iter().filter(|c| set.remove(&c.0)).count();
            if set.is_empty() {
                doc.memberships.remove(&media.0);
            }
            Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::draft;
    use tempfile::TempDir;

    #[test]
    fn create_assigns_sequential_ids() {
        let store = JsonRecordStore::in_memory();
        let a = store.create(draft("a.jpg", "image/jpeg")).unwrap();
        let b = store.create(draft("b.pdf", "application/pdf")).unwrap();
        assert_eq!(a.id, MediaId(1));
        assert_eq!(b.id, MediaId(2));
        assert_eq!(store.load(b.id).unwrap().file_name, "b.pdf");
    }

    #[test]
    fn save_requires_existing_record() {
        let store = JsonRecordStore::in_memory();
        let mut media = store.create(draft("a.jpg", "image/jpeg")).unwrap();
        media.name = "renamed".into();
        store.save(&media).unwrap();
        assert_eq!(store.load(media.id).unwrap().name, "renamed");

        media.id = MediaId(99);
        assert!(matches!(store.save(&media), Err(RecordError::NotFound(MediaId(99)))));
    }

    #[test]
    fn delete_removes_record_and_memberships() {
        let store = JsonRecordStore::in_memory();
        let media = store.create(draft("a.jpg", "image/jpeg")).unwrap();
        let collection = store.create_collection("Default").unwrap();
        store.attach(media.id, &[collection.id]).unwrap();

        store.delete(media.id).unwrap();
        assert!(matches!(store.load(media.id), Err(RecordError::NotFound(_))));
        assert!(store.query(&MediaFilter::default().in_collection("Default")).unwrap().is_empty());
    }

    #[test]
    fn query_filters_combine() {
        let store = JsonRecordStore::in_memory();
        let jpg = store.create(draft("a.jpg", "image/jpeg")).unwrap();
        let pdf = store.create(draft("b.pdf", "application/pdf")).unwrap();
        let mut png = store.create(draft("c.png", "image/png")).unwrap();
        png.set_responsive_variants(&[]);
        store.save(&png).unwrap();
        let gallery = store.create_collection("gallery").unwrap();
        store.attach(png.id, &[gallery.id]).unwrap();
        store.attach(pdf.id, &[gallery.id]).unwrap();

        let ids = |filter: MediaFilter| -> Vec<MediaId> {
            store.query(&filter).unwrap().into_iter().map(|m| m.id).collect()
        };

        assert_eq!(ids(MediaFilter::images()), vec![jpg.id, png.id]);
        assert_eq!(ids(MediaFilter::images().with_manifest(false)), vec![jpg.id]);
        assert_eq!(ids(MediaFilter::images().with_manifest(true)), vec![png.id]);
        assert_eq!(ids(MediaFilter::default().in_collection("gallery")), vec![pdf.id, png.id]);
        assert_eq!(ids(MediaFilter::images().in_collection("gallery")), vec![png.id]);
        assert_eq!(ids(MediaFilter::default().with_ids([pdf.id])), vec![pdf.id]);
        assert!(ids(MediaFilter::default().in_collection("missing")).is_empty());
    }

    #[test]
    fn collections_are_unique_by_name() {
        let store = JsonRecordStore::in_memory();
        store.create_collection("Default").unwrap();
        assert!(matches!(
            store.create_collection("Default"),
            Err(RecordError::DuplicateCollection(_))
        ));
    }

    #[test]
    fn attach_and_detach_count_changes() {
        let store = JsonRecordStore::in_memory();
        let media = store.create(draft("a.jpg", "image/jpeg")).unwrap();
        let a = store.create_collection("a").unwrap();
        let b = store.create_collection("b").unwrap();

        assert_eq!(store.attach(media.id, &[a.id, b.id]).unwrap(), 2);
        assert_eq!(store.attach(media.id, &[a.id]).unwrap(), 0);
        assert_eq!(store.collections_of(media.id).unwrap(), vec![a.id, b.id]);
        assert_eq!(store.detach(media.id, &[a.id]).unwrap(), 1);
        assert_eq!(store.collections_of(media.id).unwrap(), vec![b.id]);
        assert!(matches!(
            store.attach(media.id, &[CollectionId(42)]),
            Err(RecordError::CollectionNotFound(_))
        ));
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data/media.json");

        let store = JsonRecordStore::open(&path).unwrap();
        let mut media = store.create(draft("a.jpg", "image/jpeg")).unwrap();
        media.set_custom_property("alt", Value::String("A cat".into()));
        store.save(&media).unwrap();
        drop(store);

        let reopened = JsonRecordStore::open(&path).unwrap();
        assert_eq!(reopened.load(media.id).unwrap(), media);
        let next = reopened.create(draft("b.jpg", "image/jpeg")).unwrap();
        assert_eq!(next.id, MediaId(2));
        assert!(!tmp.path().join("data/media.json.tmp").exists());
    }

    #[test]
    fn open_rejects_other_versions() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("media.json");
        std::fs::write(
            &path,
            r#"{"version": 99, "next_media_id": 1, "next_collection_id": 1}"#,
        )
        .unwrap();
        assert!(matches!(
            JsonRecordStore::open(&path),
            Err(RecordError::UnsupportedVersion { found: 99 })
        ));
    }

    #[test]
    fn open_rejects_corrupt_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("media.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(JsonRecordStore::open(&path), Err(RecordError::Json(_))));
    }
}
