mod error;
mod store;
mod write;

pub use error::StoreError;
pub use store::{Collection, Store};
pub use write::{BulkWriteResult, WriteModel};

#[cfg(feature = "memory")]
mod memory;

#[cfg(feature = "memory")]
pub use memory::{MemoryCollection, MemoryCursor, MemoryStore};
