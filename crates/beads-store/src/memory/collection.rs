use std::ops::Bound;
use std::sync::Arc;

use beads_query::{
    Expression, FindOptions, SortDirection, apply_projection, compare_by_sort, parse_filter,
    parse_mutation,
};
use bson::oid::ObjectId;
use bson::{Bson, Document};

use crate::error::StoreError;
use crate::store::Collection;
use crate::write::{BulkWriteResult, WriteModel};

use super::store::{CollectionData, DocumentMap, IdKey};

/// Handle to one in-memory collection. Clones share the same data.
#[derive(Clone)]
pub struct MemoryCollection {
    name: Arc<str>,
    data: Arc<CollectionData>,
}

impl MemoryCollection {
    pub(crate) fn new(name: &str, data: Arc<CollectionData>) -> Self {
        Self {
            name: Arc::from(name),
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.docs.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Arc<DocumentMap> {
        self.data.docs.load_full()
    }

    /// Run `f` against a private copy of the collection and publish it only
    /// if `f` succeeds.
    fn write<T>(
        &self,
        f: impl FnOnce(&mut DocumentMap) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self
            .data
            .write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))?;
        let mut next = (**self.data.docs.load()).clone();
        let out = f(&mut next)?;
        self.data.docs.store(Arc::new(next));
        Ok(out)
    }
}

impl Collection for MemoryCollection {
    type Cursor = MemoryCursor;

    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, filter: &Document, options: &FindOptions) -> Result<MemoryCursor, StoreError> {
        let expr = parse_filter(filter)?;
        let snapshot = self.snapshot();

        let natural = match options.sort.as_slice() {
            [] => true,
            [only] => only.field == "_id" && only.direction == SortDirection::Asc,
            _ => false,
        };

        let (source, filter) = if natural {
            (
                Source::Natural {
                    snapshot,
                    after: None,
                },
                expr,
            )
        } else {
            let mut docs: Vec<Document> = snapshot
                .values()
                .filter(|doc| expr.matches(doc))
                .cloned()
                .collect();
            docs.sort_by(|a, b| compare_by_sort(a, b, &options.sort));
            (Source::Sorted(docs.into_iter()), Expression::always())
        };

        Ok(MemoryCursor {
            source,
            filter,
            projection: options.projection.clone(),
            skip: options.skip.unwrap_or(0),
            remaining: options.limit,
            exhausted: false,
        })
    }

    fn insert_many(&self, docs: &[Document]) -> Result<u64, StoreError> {
        self.write(|map| {
            for doc in docs {
                insert_document(map, doc.clone())?;
            }
            Ok(docs.len() as u64)
        })
    }

    fn bulk_write(&self, ops: &[WriteModel]) -> Result<BulkWriteResult, StoreError> {
        self.write(|map| {
            let mut result = BulkWriteResult::default();
            for op in ops {
                apply_write(map, op, &mut result)?;
            }
            Ok(result)
        })
    }

    fn delete_many(&self, filter: &Document) -> Result<u64, StoreError> {
        let expr = parse_filter(filter)?;
        self.write(|map| {
            let keys = matching_keys(map, &expr, None);
            for key in &keys {
                map.remove(key);
            }
            Ok(keys.len() as u64)
        })
    }
}

enum Source {
    /// Streams the snapshot in `_id` order, one range lookup per document.
    Natural {
        snapshot: Arc<DocumentMap>,
        after: Option<IdKey>,
    },
    Sorted(std::vec::IntoIter<Document>),
}

impl Source {
    fn next_doc(&mut self) -> Option<Document> {
        match self {
            Source::Natural { snapshot, after } => {
                let lower = match after {
                    Some(key) => Bound::Excluded(key.clone()),
                    None => Bound::Unbounded,
                };
                let (key, doc) = snapshot.range((lower, Bound::Unbounded)).next()?;
                *after = Some(key.clone());
                Some(doc.clone())
            }
            Source::Sorted(iter) => iter.next(),
        }
    }
}

/// A streaming cursor over a collection snapshot.
///
/// Writes published after the cursor was opened are not visible to it.
pub struct MemoryCursor {
    source: Source,
    filter: Expression,
    projection: Option<Vec<String>>,
    skip: usize,
    remaining: Option<usize>,
    exhausted: bool,
}

impl Iterator for MemoryCursor {
    type Item = Result<Document, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.exhausted || self.remaining == Some(0) {
                return None;
            }
            let Some(mut doc) = self.source.next_doc() else {
                self.exhausted = true;
                return None;
            };
            if !self.filter.matches(&doc) {
                continue;
            }
            if self.skip > 0 {
                self.skip -= 1;
                continue;
            }
            if let Some(n) = self.remaining.as_mut() {
                *n -= 1;
            }
            if let Some(fields) = &self.projection {
                apply_projection(&mut doc, fields);
            }
            return Some(Ok(doc));
        }
    }
}

// ── Write helpers ───────────────────────────────────────────────

/// Insert a document, generating an `ObjectId` `_id` (placed first) when
/// missing. Fails on duplicate `_id`.
fn insert_document(map: &mut DocumentMap, doc: Document) -> Result<Bson, StoreError> {
    let doc = match doc.get("_id") {
        Some(_) => doc,
        None => {
            let mut with_id = Document::new();
            with_id.insert("_id", ObjectId::new());
            for (k, v) in doc {
                with_id.insert(k, v);
            }
            with_id
        }
    };
    let id = doc.get("_id").cloned().unwrap_or(Bson::Null);
    let key = IdKey(id.clone());
    if map.contains_key(&key) {
        return Err(StoreError::DuplicateKey(id.to_string()));
    }
    map.insert(key, doc);
    Ok(id)
}

fn matching_keys(map: &DocumentMap, expr: &Expression, limit: Option<usize>) -> Vec<IdKey> {
    let matched = map
        .iter()
        .filter(|(_, doc)| expr.matches(doc))
        .map(|(key, _)| key.clone());
    match limit {
        Some(n) => matched.take(n).collect(),
        None => matched.collect(),
    }
}

fn apply_write(
    map: &mut DocumentMap,
    op: &WriteModel,
    result: &mut BulkWriteResult,
) -> Result<(), StoreError> {
    match op {
        WriteModel::InsertOne { document } => {
            insert_document(map, document.clone())?;
            result.inserted += 1;
        }
        WriteModel::UpdateOne {
            filter,
            update,
            upsert,
        } => update_matching(map, filter, update, Some(1), *upsert, result)?,
        WriteModel::UpdateMany { filter, update } => {
            update_matching(map, filter, update, None, false, result)?
        }
        WriteModel::ReplaceOne {
            filter,
            replacement,
            upsert,
        } => {
            let expr = parse_filter(filter)?;
            match matching_keys(map, &expr, Some(1)).pop() {
                Some(key) => {
                    if let Some(id) = replacement.get("_id") {
                        if IdKey(id.clone()) != key {
                            return Err(StoreError::InvalidOperation(
                                "replacement cannot change _id".into(),
                            ));
                        }
                    }
                    let mut next = Document::new();
                    next.insert("_id", key.0.clone());
                    for (k, v) in replacement {
                        if k != "_id" {
                            next.insert(k.clone(), v.clone());
                        }
                    }
                    result.matched += 1;
                    if map.get(&key) != Some(&next) {
                        result.modified += 1;
                    }
                    map.insert(key, next);
                }
                None if *upsert => {
                    let mut seed = upsert_seed(filter);
                    for (k, v) in replacement {
                        seed.insert(k.clone(), v.clone());
                    }
                    insert_document(map, seed)?;
                    result.upserted += 1;
                }
                None => {}
            }
        }
        WriteModel::DeleteOne { filter } => {
            let expr = parse_filter(filter)?;
            if let Some(key) = matching_keys(map, &expr, Some(1)).pop() {
                map.remove(&key);
                result.deleted += 1;
            }
        }
        WriteModel::DeleteMany { filter } => {
            let expr = parse_filter(filter)?;
            for key in matching_keys(map, &expr, None) {
                map.remove(&key);
                result.deleted += 1;
            }
        }
    }
    Ok(())
}

fn update_matching(
    map: &mut DocumentMap,
    filter: &Document,
    update: &Document,
    limit: Option<usize>,
    upsert: bool,
    result: &mut BulkWriteResult,
) -> Result<(), StoreError> {
    let expr = parse_filter(filter)?;
    let mutation = parse_mutation(update)?;
    let keys = matching_keys(map, &expr, limit);

    if keys.is_empty() && upsert {
        let mut seed = upsert_seed(filter);
        mutation.apply(&mut seed)?;
        insert_document(map, seed)?;
        result.upserted += 1;
        return Ok(());
    }

    for key in keys {
        let Some(mut doc) = map.get(&key).cloned() else {
            continue;
        };
        result.matched += 1;
        if mutation.apply(&mut doc)? {
            result.modified += 1;
            map.insert(key, doc);
        }
    }
    Ok(())
}

/// Equality fields of a filter, used as the base document of an upsert.
fn upsert_seed(filter: &Document) -> Document {
    let mut seed = Document::new();
    for (key, value) in filter {
        if key.starts_with('$') || key.contains('.') {
            continue;
        }
        if let Bson::Document(sub) = value {
            if sub.keys().next().is_some_and(|k| k.starts_with('$')) {
                continue;
            }
        }
        seed.insert(key.clone(), value.clone());
    }
    seed
}
