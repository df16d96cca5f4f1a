mod collection;
mod store;

pub use collection::{MemoryCollection, MemoryCursor};
pub use store::MemoryStore;
