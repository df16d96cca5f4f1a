use std::fmt;

use beads_query::{FilterParseError, MutationError};

#[derive(Debug)]
pub enum StoreError {
    InvalidName(String),
    InvalidFilter(FilterParseError),
    InvalidUpdate(MutationError),
    InvalidOperation(String),
    DuplicateKey(String),
    Storage(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::InvalidName(name) => write!(f, "invalid collection name: {name:?}"),
            StoreError::InvalidFilter(e) => write!(f, "invalid filter: {e}"),
            StoreError::InvalidUpdate(e) => write!(f, "invalid update: {e}"),
            StoreError::InvalidOperation(msg) => write!(f, "invalid operation: {msg}"),
            StoreError::DuplicateKey(id) => write!(f, "duplicate key: {id}"),
            StoreError::Storage(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::InvalidFilter(e) => Some(e),
            StoreError::InvalidUpdate(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FilterParseError> for StoreError {
    fn from(e: FilterParseError) -> Self {
        StoreError::InvalidFilter(e)
    }
}

impl From<MutationError> for StoreError {
    fn from(e: MutationError) -> Self {
        StoreError::InvalidUpdate(e)
    }
}
