//! Named collections and media membership.
//!
//! Membership is plain many-to-many bookkeeping kept by the
//! [`RecordStore`]. Callers name collections with a [`Selector`]: ids, names,
//! or collections they already hold. [`Selector::resolve`] is the single
//! place that turns any of those into stored collections.

use crate::media::MediaId;
use crate::records::{RecordError, RecordStore};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(pub u64);

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCollection {
    pub id: CollectionId,
    pub name: String,
}

/// Which collections an operation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    ById(Vec<CollectionId>),
    ByName(Vec<String>),
    /// Collections already loaded; used as-is without a lookup.
    ByEntities(Vec<MediaCollection>),
}

impl Selector {
    pub fn name(name: impl Into<String>) -> Self {
        Selector::ByName(vec![name.into()])
    }

    pub fn id(id: CollectionId) -> Self {
        Selector::ById(vec![id])
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Selector::ById(ids) => ids.is_empty(),
            Selector::ByName(names) => names.is_empty(),
            Selector::ByEntities(items) => items.is_empty(),
        }
    }

    /// Stored collections matching the selector. Unknown ids and names are
    /// skipped.
    pub fn resolve(&self, store: &dyn RecordStore) -> Result<Vec<MediaCollection>, RecordError> {
        if let Selector::ByEntities(items) = self {
            return Ok(items.clone());
        }
        let all = store.collections()?;
        Ok(all
            .into_iter()
            .filter(|c| match self {
                Selector::ById(ids) => ids.contains(&c.id),
                Selector::ByName(names) => names.iter().any(|n| *n == c.name),
                Selector::ByEntities(_) => false,
            })
            .collect())
    }

    fn resolve_ids(&self, store: &dyn RecordStore) -> Result<Vec<CollectionId>, RecordError> {
        Ok(self.resolve(store)?.into_iter().map(|c| c.id).collect())
    }
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Selector::name(name)
    }
}

impl From<CollectionId> for Selector {
    fn from(id: CollectionId) -> Self {
        Selector::id(id)
    }
}

impl From<MediaCollection> for Selector {
    fn from(collection: MediaCollection) -> Self {
        Selector::ByEntities(vec![collection])
    }
}

/// Memberships added and removed by [`sync`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncChanges {
    pub attached: Vec<CollectionId>,
    pub detached: Vec<CollectionId>,
}

/// Add `media` to the selected collections. Returns how many were new.
pub fn attach(store: &dyn RecordStore, media: MediaId, selector: &Selector) -> Result<usize, RecordError> {
    let ids = selector.resolve_ids(store)?;
    store.attach(media, &ids)
}

/// Remove `media` from the selected collections. An empty selector removes
/// it from all of them.
pub fn detach(store: &dyn RecordStore, media: MediaId, selector: &Selector) -> Result<usize, RecordError> {
    let ids = if selector.is_empty() {
        store.collections_of(media)?
    } else {
        selector.resolve_ids(store)?
    };
    store.detach(media, &ids)
}

/// Make the selected collections the media's membership. With `detaching`
/// off, existing memberships outside the selection are kept. An empty
/// selector always detaches everything.
pub fn sync(
    store: &dyn RecordStore,
    media: MediaId,
    selector: &Selector,
    detaching: bool,
) -> Result<SyncChanges, RecordError> {
    let current = store.collections_of(media)?;
    let wanted = if selector.is_empty() {
        Vec::new()
    } else {
        selector.resolve_ids(store)?
    };

    let attached: Vec<_> = wanted.iter().copied().filter(|id| !current.contains(id)).collect();
    let detached: Vec<_> = if detaching || selector.is_empty() {
        current.iter().copied().filter(|id| !wanted.contains(id)).collect()
    } else {
        Vec::new()
    };

    store.attach(media, &attached)?;
    store.detach(media, &detached)?;
    Ok(SyncChanges { attached, detached })
}
