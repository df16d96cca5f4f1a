use beads_query::{FindOptions, Sort, get_path};
use beads_store::{Collection, Store};
use bson::{Bson, Document, doc, oid::ObjectId};

use crate::bulk::{DeleteBuffer, InsertBuffer, OperationBuffer, SaveBuffer, UpdateBuffer};
use crate::chunks::{Chunks, chunks};
use crate::error::ChainError;
use crate::lookup::lookup;
use crate::spec::{LookupOptions, QuerySpec};

/// Convenience wrapper bundling the pipeline helpers around one
/// collection handle.
#[derive(Debug, Clone)]
pub struct Model<C> {
    collection: C,
}

impl<C: Collection> Model<C> {
    pub fn new(collection: C) -> Self {
        Self { collection }
    }

    pub fn open<S>(store: &S, name: &str) -> Result<Self, ChainError>
    where
        S: Store<Collection = C>,
    {
        if name.is_empty() {
            return Err(ChainError::Config("collection name cannot be empty".into()));
        }
        store
            .collection(name)
            .map(Self::new)
            .map_err(|e| ChainError::query(name, e))
    }

    pub fn name(&self) -> &str {
        self.collection.name()
    }

    pub fn collection(&self) -> &C {
        &self.collection
    }

    // ── Reads ───────────────────────────────────────────────────

    pub fn chunks(&self, query: &QuerySpec) -> Result<Chunks<C::Cursor>, ChainError> {
        chunks(&self.collection, query)
    }

    /// Attach this collection's documents to `docs`. See [`lookup`].
    pub fn lookup(
        &self,
        docs: &mut [Document],
        key: &str,
        options: &LookupOptions,
    ) -> Result<(), ChainError> {
        lookup(&self.collection, docs, key, options)
    }

    /// Fetch by `_id`. A 24-character hex string is also tried as an
    /// `ObjectId`.
    pub fn find_by_id(&self, id: impl Into<Bson>) -> Result<Option<Document>, ChainError> {
        let id = match id.into() {
            Bson::String(s) => match ObjectId::parse_str(&s) {
                Ok(oid) => Bson::ObjectId(oid),
                Err(_) => Bson::String(s),
            },
            other => other,
        };
        self.collection
            .find_one(&doc! { "_id": id })
            .map_err(|e| ChainError::query(self.name(), e))
    }

    /// First match under `sort`, `_id` ascending by default.
    pub fn find_first(
        &self,
        filter: &Document,
        sort: Option<Vec<Sort>>,
    ) -> Result<Option<Document>, ChainError> {
        self.find_single(filter, sort.unwrap_or_else(|| vec![Sort::asc("_id")]))
    }

    /// First match under `sort`, `_id` descending by default.
    pub fn find_last(
        &self,
        filter: &Document,
        sort: Option<Vec<Sort>>,
    ) -> Result<Option<Document>, ChainError> {
        self.find_single(filter, sort.unwrap_or_else(|| vec![Sort::desc("_id")]))
    }

    fn find_single(&self, filter: &Document, sort: Vec<Sort>) -> Result<Option<Document>, ChainError> {
        let options = FindOptions::default().with_sort(sort).with_limit(1);
        let mut cursor = self
            .collection
            .find(filter, &options)
            .map_err(|e| ChainError::query(self.name(), e))?;
        cursor
            .next()
            .transpose()
            .map_err(|e| ChainError::query(self.name(), e))
    }

    /// Map `key_field` to `value_field` across every match of `filter`.
    ///
    /// Keys are rendered as strings (`ObjectId`s as hex). Documents without
    /// a key are skipped, a missing value becomes `null`, and later
    /// duplicates overwrite earlier ones in place.
    pub fn get_list(
        &self,
        key_field: &str,
        value_field: &str,
        filter: &Document,
    ) -> Result<Document, ChainError> {
        let cursor = self
            .collection
            .find(filter, &FindOptions::default())
            .map_err(|e| ChainError::query(self.name(), e))?;
        let mut list = Document::new();
        for doc in cursor {
            let doc = doc.map_err(|e| ChainError::query(self.name(), e))?;
            let key = match get_path(&doc, key_field) {
                None | Some(Bson::Null) | Some(Bson::Undefined) => continue,
                Some(Bson::String(s)) => s.clone(),
                Some(Bson::ObjectId(oid)) => oid.to_hex(),
                Some(other) => other.to_string(),
            };
            let value = get_path(&doc, value_field).cloned().unwrap_or(Bson::Null);
            list.insert(key, value);
        }
        Ok(list)
    }

    // ── Writes ──────────────────────────────────────────────────

    /// Delete `docs` by `_id` in one `delete_many`.
    pub fn delete_all(&self, docs: &[Document]) -> Result<u64, ChainError> {
        let ids = docs
            .iter()
            .map(|d| {
                d.get("_id")
                    .cloned()
                    .ok_or_else(|| ChainError::DataShape("delete_all requires an _id on every document".into()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if ids.is_empty() {
            return Ok(0);
        }
        self.collection
            .delete_many(&doc! { "_id": { "$in": ids } })
            .map_err(|e| ChainError::write(self.name(), e))
    }

    pub fn insert_buffer(&self) -> InsertBuffer<C> {
        InsertBuffer::new(self.collection.clone())
    }

    pub fn save_buffer(&self) -> SaveBuffer<C> {
        SaveBuffer::new(self.collection.clone())
    }

    pub fn update_buffer(&self) -> UpdateBuffer<C> {
        UpdateBuffer::new(self.collection.clone())
    }

    pub fn delete_buffer(&self) -> DeleteBuffer<C> {
        DeleteBuffer::new(self.collection.clone())
    }

    pub fn operation_buffer(&self) -> OperationBuffer<C> {
        OperationBuffer::new(self.collection.clone())
    }
}
