use std::fmt;
use std::marker::PhantomData;

use beads_store::{Collection, StoreError, WriteModel};
use bson::{Bson, Document, doc};
use tracing::{debug, warn};

use crate::error::ChainError;

/// Number of buffered operations that triggers an automatic flush.
pub const FLUSH_THRESHOLD: usize = 1000;

/// A family of buffered writes: how an added item becomes a buffered
/// operation, and how a batch of operations is sent to the store.
pub trait BulkKind {
    type Item;
    type Op;

    const NAME: &'static str;

    fn prepare(item: Self::Item) -> Result<Self::Op, ChainError>;

    /// Issue exactly one batched write for `ops`.
    fn write<C: Collection>(collection: &C, ops: &[Self::Op]) -> Result<u64, StoreError>;
}

fn require_id(doc: &Document, kind: &str) -> Result<Bson, ChainError> {
    doc.get("_id")
        .cloned()
        .ok_or_else(|| ChainError::DataShape(format!("{kind} requires an _id on every document")))
}

/// Plain inserts via `insert_many`.
pub enum Insert {}

impl BulkKind for Insert {
    type Item = Document;
    type Op = Document;

    const NAME: &'static str = "insert";

    fn prepare(item: Document) -> Result<Document, ChainError> {
        Ok(item)
    }

    fn write<C: Collection>(collection: &C, ops: &[Document]) -> Result<u64, StoreError> {
        collection.insert_many(ops)
    }
}

/// Whole-document replacement keyed by `_id`.
pub enum Save {}

impl BulkKind for Save {
    type Item = Document;
    type Op = WriteModel;

    const NAME: &'static str = "save";

    fn prepare(item: Document) -> Result<WriteModel, ChainError> {
        let id = require_id(&item, Self::NAME)?;
        Ok(WriteModel::ReplaceOne {
            filter: doc! { "_id": id },
            replacement: item,
            upsert: false,
        })
    }

    fn write<C: Collection>(collection: &C, ops: &[WriteModel]) -> Result<u64, StoreError> {
        collection.bulk_write(ops).map(|r| r.modified)
    }
}

/// `(filter, update)` pairs applied with update-one semantics.
pub enum Update {}

impl BulkKind for Update {
    type Item = (Document, Document);
    type Op = WriteModel;

    const NAME: &'static str = "update";

    fn prepare((filter, update): (Document, Document)) -> Result<WriteModel, ChainError> {
        Ok(WriteModel::UpdateOne {
            filter,
            update,
            upsert: false,
        })
    }

    fn write<C: Collection>(collection: &C, ops: &[WriteModel]) -> Result<u64, StoreError> {
        collection.bulk_write(ops).map(|r| r.modified)
    }
}

/// Deletes by `_id`, sent as one `delete_many` with an `$in` filter.
pub enum Delete {}

impl BulkKind for Delete {
    type Item = Document;
    type Op = Bson;

    const NAME: &'static str = "delete";

    fn prepare(item: Document) -> Result<Bson, ChainError> {
        require_id(&item, Self::NAME)
    }

    fn write<C: Collection>(collection: &C, ids: &[Bson]) -> Result<u64, StoreError> {
        collection.delete_many(&doc! { "_id": { "$in": ids.to_vec() } })
    }
}

/// Arbitrary write models through `bulk_write`.
pub enum Operation {}

impl BulkKind for Operation {
    type Item = WriteModel;
    type Op = WriteModel;

    const NAME: &'static str = "operation";

    fn prepare(item: WriteModel) -> Result<WriteModel, ChainError> {
        Ok(item)
    }

    fn write<C: Collection>(collection: &C, ops: &[WriteModel]) -> Result<u64, StoreError> {
        collection.bulk_write(ops).map(|r| {
            r.inserted + r.modified + r.deleted + r.upserted
        })
    }
}

/// Accumulates write operations for one collection and sends them in
/// batches of at most `threshold`.
///
/// A failed flush keeps the buffered operations, so calling
/// [`flush`](Self::flush) again re-sends the same batch. Finish with
/// [`close`](Self::close); a buffer dropped with pending operations logs a
/// warning and discards them.
pub struct BulkBuffer<C: Collection, K: BulkKind> {
    collection: C,
    ops: Vec<K::Op>,
    threshold: usize,
    _kind: PhantomData<K>,
}

pub type InsertBuffer<C> = BulkBuffer<C, Insert>;
pub type SaveBuffer<C> = BulkBuffer<C, Save>;
pub type UpdateBuffer<C> = BulkBuffer<C, Update>;
pub type DeleteBuffer<C> = BulkBuffer<C, Delete>;
pub type OperationBuffer<C> = BulkBuffer<C, Operation>;

impl<C: Collection, K: BulkKind> BulkBuffer<C, K> {
    pub fn new(collection: C) -> Self {
        Self::with_threshold(collection, FLUSH_THRESHOLD)
    }

    pub fn with_threshold(collection: C, threshold: usize) -> Self {
        Self {
            collection,
            ops: Vec::new(),
            threshold: threshold.max(1),
            _kind: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Buffer one item, flushing once the threshold is reached.
    ///
    /// A full buffer left behind by a failed flush is retried before `item`
    /// is buffered, so no write ever exceeds the threshold. If that retry
    /// fails, `item` is not buffered.
    ///
    /// Returns the number of operations written (0 if nothing was flushed).
    pub fn add(&mut self, item: K::Item) -> Result<usize, ChainError> {
        let op = K::prepare(item)?;
        let mut written = 0;
        if self.ops.len() >= self.threshold {
            written += self.flush()?;
        }
        self.ops.push(op);
        if self.ops.len() >= self.threshold {
            written += self.flush()?;
        }
        Ok(written)
    }

    /// Send everything buffered in one batched write.
    pub fn flush(&mut self) -> Result<usize, ChainError> {
        if self.ops.is_empty() {
            return Ok(0);
        }
        let count = self.ops.len();
        let affected = K::write(&self.collection, &self.ops)
            .map_err(|e| ChainError::write(self.collection.name(), e))?;
        self.ops.clear();
        debug!(
            collection = self.collection.name(),
            kind = K::NAME,
            ops = count,
            affected,
            "bulk flush"
        );
        Ok(count)
    }

    /// Flush the remainder and consume the buffer.
    ///
    /// On failure the buffer, with its operations intact, is returned inside
    /// the error.
    pub fn close(mut self) -> Result<(), CloseError<Self>> {
        match self.flush() {
            Ok(_) => Ok(()),
            Err(error) => Err(CloseError { error, buffer: self }),
        }
    }
}

impl<C: Collection, K: BulkKind> Drop for BulkBuffer<C, K> {
    fn drop(&mut self) {
        if !self.ops.is_empty() {
            warn!(
                collection = self.collection.name(),
                kind = K::NAME,
                pending = self.ops.len(),
                "bulk buffer dropped with unflushed operations"
            );
        }
    }
}

/// A failed [`BulkBuffer::close`], carrying the buffer back to the caller.
pub struct CloseError<B> {
    error: ChainError,
    buffer: B,
}

impl<B> CloseError<B> {
    pub fn error(&self) -> &ChainError {
        &self.error
    }

    pub fn into_buffer(self) -> B {
        self.buffer
    }

    pub fn into_parts(self) -> (ChainError, B) {
        (self.error, self.buffer)
    }
}

impl<B> fmt::Debug for CloseError<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<B> fmt::Display for CloseError<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "closing bulk buffer: {}", self.error)
    }
}

impl<B> std::error::Error for CloseError<B> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<B> From<CloseError<B>> for ChainError {
    fn from(e: CloseError<B>) -> Self {
        e.error
    }
}
