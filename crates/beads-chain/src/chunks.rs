use beads_store::{Collection, StoreError};
use bson::Document;

use crate::error::ChainError;
use crate::spec::QuerySpec;

/// Open a cursor on `collection` and batch it into vectors of `query.size`
/// documents. Each call opens a fresh cursor.
pub fn chunks<C: Collection>(
    collection: &C,
    query: &QuerySpec,
) -> Result<Chunks<C::Cursor>, ChainError> {
    query.validate()?;
    let cursor = collection
        .find(&query.filter, &query.find_options())
        .map_err(|e| ChainError::query(collection.name(), e))?;
    Ok(Chunks::new(collection.name(), cursor, query.size))
}

/// Batches of documents pulled from a store cursor.
///
/// The cursor is dropped as soon as it is exhausted or fails; the sequence
/// ends after the first error.
pub struct Chunks<I> {
    collection: String,
    cursor: Option<I>,
    size: usize,
}

impl<I> Chunks<I> {
    pub(crate) fn new(collection: &str, cursor: I, size: usize) -> Self {
        Self {
            collection: collection.to_string(),
            cursor: Some(cursor),
            size: size.max(1),
        }
    }

    /// Whether the underlying cursor is still held.
    pub fn is_open(&self) -> bool {
        self.cursor.is_some()
    }
}

impl<I> Iterator for Chunks<I>
where
    I: Iterator<Item = Result<Document, StoreError>>,
{
    type Item = Result<Vec<Document>, ChainError>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor.as_mut()?;
        let mut batch = Vec::new();
        loop {
            match cursor.next() {
                Some(Ok(doc)) => {
                    batch.push(doc);
                    if batch.len() >= self.size {
                        return Some(Ok(batch));
                    }
                }
                Some(Err(e)) => {
                    self.cursor = None;
                    return Some(Err(ChainError::query(&self.collection, e)));
                }
                None => {
                    self.cursor = None;
                    return (!batch.is_empty()).then_some(Ok(batch));
                }
            }
        }
    }
}
