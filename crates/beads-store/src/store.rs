use beads_query::FindOptions;
use bson::Document;

use crate::error::StoreError;
use crate::write::{BulkWriteResult, WriteModel};

/// A document store that hands out collection handles by name.
pub trait Store {
    type Collection: Collection;

    /// Resolve a collection handle. Backends may create the collection lazily.
    fn collection(&self, name: &str) -> Result<Self::Collection, StoreError>;
}

/// The narrow set of operations the pipeline needs from one collection.
///
/// Handles must be cheaply cloneable (backends share state behind `Arc`s).
/// Cursors own whatever they need to keep streaming, so dropping a cursor
/// releases it.
pub trait Collection: Clone {
    type Cursor: Iterator<Item = Result<Document, StoreError>>;

    fn name(&self) -> &str;

    // Reads
    fn find(&self, filter: &Document, options: &FindOptions) -> Result<Self::Cursor, StoreError>;

    /// First document matching `filter` in natural order.
    fn find_one(&self, filter: &Document) -> Result<Option<Document>, StoreError> {
        let options = FindOptions::default().with_limit(1);
        self.find(filter, &options)?.next().transpose()
    }

    // Writes
    fn insert_many(&self, docs: &[Document]) -> Result<u64, StoreError>;
    fn bulk_write(&self, ops: &[WriteModel]) -> Result<BulkWriteResult, StoreError>;
    fn delete_many(&self, filter: &Document) -> Result<u64, StoreError>;
}
