use beads_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// Malformed chain specification, configuration file or predicate.
    /// Raised before any I/O.
    #[error("config error: {0}")]
    Config(String),

    /// A cursor fetch or lookup query failed.
    #[error("query on '{collection}' failed: {source}")]
    Query {
        collection: String,
        #[source]
        source: StoreError,
    },

    /// A batched write failed. The buffer that issued it keeps its operations.
    #[error("write to '{collection}' failed: {source}")]
    Write {
        collection: String,
        #[source]
        source: StoreError,
    },

    /// A document lacks a field the operation requires (e.g. `_id`).
    #[error("data shape error: {0}")]
    DataShape(String),
}

impl ChainError {
    pub(crate) fn query(collection: &str, source: StoreError) -> Self {
        ChainError::Query {
            collection: collection.to_string(),
            source,
        }
    }

    pub(crate) fn write(collection: &str, source: StoreError) -> Self {
        ChainError::Write {
            collection: collection.to_string(),
            source,
        }
    }
}
