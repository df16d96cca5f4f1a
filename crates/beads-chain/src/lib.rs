mod bulk;
mod chunks;
mod config;
mod counters;
mod error;
mod key;
mod lookup;
mod model;
mod runner;
mod spec;

pub use bson::{Bson, Document};
pub use bulk::{
    BulkBuffer, BulkKind, CloseError, DeleteBuffer, Delete, FLUSH_THRESHOLD, Insert, InsertBuffer,
    Operation, OperationBuffer, Save, SaveBuffer, Update, UpdateBuffer,
};
pub use chunks::{Chunks, chunks};
pub use config::{ChainConfig, CutoffConfig, StageConfig};
pub use counters::{Counters, IN, OUT};
pub use error::ChainError;
pub use lookup::lookup;
pub use model::Model;
pub use runner::{ChainRunner, Lookups, RunState};
pub use spec::{
    ChainSpec, ChainSpecBuilder, Cutoff, DEFAULT_BATCH_SIZE, JoinMode, JoinSpec, LookupOptions,
    Predicate, QuerySpec,
};
