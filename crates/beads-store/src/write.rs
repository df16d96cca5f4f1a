use bson::{Bson, Document};

use crate::error::StoreError;

/// One operation inside a batched `bulk_write`.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteModel {
    InsertOne {
        document: Document,
    },
    UpdateOne {
        filter: Document,
        update: Document,
        upsert: bool,
    },
    UpdateMany {
        filter: Document,
        update: Document,
    },
    ReplaceOne {
        filter: Document,
        replacement: Document,
        upsert: bool,
    },
    DeleteOne {
        filter: Document,
    },
    DeleteMany {
        filter: Document,
    },
}

impl WriteModel {
    /// Build a write model from an operation name and its parameter document,
    /// e.g. `("updateOne", { filter: {...}, update: {...}, upsert: true })`.
    pub fn from_operation(kind: &str, params: Document) -> Result<Self, StoreError> {
        let model = match kind {
            "insertOne" => WriteModel::InsertOne {
                document: take_document(&params, kind, "document")?,
            },
            "updateOne" => WriteModel::UpdateOne {
                filter: take_document(&params, kind, "filter")?,
                update: take_document(&params, kind, "update")?,
                upsert: take_upsert(&params, kind)?,
            },
            "updateMany" => WriteModel::UpdateMany {
                filter: take_document(&params, kind, "filter")?,
                update: take_document(&params, kind, "update")?,
            },
            "replaceOne" => WriteModel::ReplaceOne {
                filter: take_document(&params, kind, "filter")?,
                replacement: take_document(&params, kind, "replacement")?,
                upsert: take_upsert(&params, kind)?,
            },
            "deleteOne" => WriteModel::DeleteOne {
                filter: take_document(&params, kind, "filter")?,
            },
            "deleteMany" => WriteModel::DeleteMany {
                filter: take_document(&params, kind, "filter")?,
            },
            other => {
                return Err(StoreError::InvalidOperation(format!(
                    "unknown write operation: {other}"
                )));
            }
        };
        Ok(model)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WriteModel::InsertOne { .. } => "insertOne",
            WriteModel::UpdateOne { .. } => "updateOne",
            WriteModel::UpdateMany { .. } => "updateMany",
            WriteModel::ReplaceOne { .. } => "replaceOne",
            WriteModel::DeleteOne { .. } => "deleteOne",
            WriteModel::DeleteMany { .. } => "deleteMany",
        }
    }
}

fn take_document(params: &Document, kind: &str, key: &str) -> Result<Document, StoreError> {
    match params.get(key) {
        Some(Bson::Document(d)) => Ok(d.clone()),
        Some(_) => Err(StoreError::InvalidOperation(format!(
            "{kind}.{key} must be a document"
        ))),
        None => Err(StoreError::InvalidOperation(format!(
            "{kind} requires '{key}'"
        ))),
    }
}

fn take_upsert(params: &Document, kind: &str) -> Result<bool, StoreError> {
    match params.get("upsert") {
        None => Ok(false),
        Some(Bson::Boolean(b)) => Ok(*b),
        Some(_) => Err(StoreError::InvalidOperation(format!(
            "{kind}.upsert must be a boolean"
        ))),
    }
}

/// Aggregate outcome of one `bulk_write` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkWriteResult {
    pub inserted: u64,
    pub matched: u64,
    pub modified: u64,
    pub deleted: u64,
    pub upserted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn operation_names_map_to_models() {
        let op = WriteModel::from_operation(
            "updateOne",
            doc! { "filter": { "_id": 1 }, "update": { "$set": { "a": 1 } }, "upsert": true },
        )
        .unwrap();
        assert_eq!(
            op,
            WriteModel::UpdateOne {
                filter: doc! { "_id": 1 },
                update: doc! { "$set": { "a": 1 } },
                upsert: true,
            }
        );
        assert_eq!(op.kind(), "updateOne");
    }

    #[test]
    fn missing_or_unknown_parameters_fail() {
        assert!(WriteModel::from_operation("deleteOne", doc! {}).is_err());
        assert!(WriteModel::from_operation("replaceOne", doc! { "filter": {}, "replacement": 3 }).is_err());
        assert!(WriteModel::from_operation("upsertAll", doc! {}).is_err());
    }
}
