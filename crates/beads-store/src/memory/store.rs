use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use arc_swap::ArcSwap;
use beads_query::compare_values;
use bson::Bson;
use imbl::OrdMap;

use crate::error::StoreError;
use crate::store::Store;

use super::collection::MemoryCollection;

/// Documents of one collection, ordered by `_id`.
pub(crate) type DocumentMap = OrdMap<IdKey, bson::Document>;

/// An `_id` value ordered with the canonical cross-type value order, so
/// `9`, `9i64` and `9.0` address the same document.
#[derive(Debug, Clone)]
pub(crate) struct IdKey(pub(crate) Bson);

impl Ord for IdKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_values(Some(&self.0), Some(&other.0))
    }
}

impl PartialOrd for IdKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for IdKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IdKey {}

pub(crate) struct CollectionData {
    pub(crate) docs: ArcSwap<DocumentMap>,
    pub(crate) write_lock: Mutex<()>,
}

/// In-memory document store.
///
/// Readers load an immutable snapshot of a collection (cheap due to imbl
/// structural sharing). Writers serialise on a per-collection lock, apply
/// their changes to a private copy and publish it in one swap, so a failed
/// batch leaves the collection untouched.
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Arc<CollectionData>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Names of every collection created so far, sorted.
    pub fn collection_names(&self) -> Result<Vec<String>, StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|e| StoreError::Storage(format!("collection lock poisoned: {e}")))?;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Remove a collection and all its documents.
    pub fn drop_collection(&self, name: &str) -> Result<(), StoreError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::Storage(format!("collection lock poisoned: {e}")))?;
        collections.remove(name);
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    type Collection = MemoryCollection;

    fn collection(&self, name: &str) -> Result<MemoryCollection, StoreError> {
        if name.is_empty() {
            return Err(StoreError::InvalidName(name.to_string()));
        }

        {
            let collections = self
                .collections
                .read()
                .map_err(|e| StoreError::Storage(format!("collection lock poisoned: {e}")))?;
            if let Some(data) = collections.get(name) {
                return Ok(MemoryCollection::new(name, Arc::clone(data)));
            }
        }

        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::Storage(format!("collection lock poisoned: {e}")))?;
        let data = collections.entry(name.to_string()).or_insert_with(|| {
            Arc::new(CollectionData {
                docs: ArcSwap::new(Arc::new(OrdMap::new())),
                write_lock: Mutex::new(()),
            })
        });
        Ok(MemoryCollection::new(name, Arc::clone(data)))
    }
}
