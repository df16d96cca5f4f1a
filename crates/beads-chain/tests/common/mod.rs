#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use beads_query::FindOptions;
use beads_store::{
    BulkWriteResult, Collection, MemoryCollection, MemoryCursor, MemoryStore, Store, StoreError,
    WriteModel,
};
use bson::{Document, doc};

/// One call that reached the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Find {
        collection: String,
        filter: Document,
        options: FindOptions,
    },
    InsertMany {
        collection: String,
        count: usize,
    },
    BulkWrite {
        collection: String,
        count: usize,
    },
    DeleteMany {
        collection: String,
        filter: Document,
    },
}

#[derive(Default)]
struct Log {
    calls: Mutex<Vec<Call>>,
    pulled: AtomicUsize,
    fail_writes: AtomicBool,
    fail_finds_on: Mutex<Option<String>>,
}

impl Log {
    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

/// Memory store wrapper that records every call and can inject failures.
pub struct RecordingStore {
    inner: MemoryStore,
    log: Arc<Log>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            log: Arc::new(Log::default()),
        }
    }

    /// Insert without recording.
    pub fn seed(&self, name: &str, docs: Vec<Document>) {
        self.inner.collection(name).unwrap().insert_many(&docs).unwrap();
    }

    /// Every document in `name`, in `_id` order.
    pub fn docs(&self, name: &str) -> Vec<Document> {
        self.inner
            .collection(name)
            .unwrap()
            .find(&doc! {}, &FindOptions::default())
            .unwrap()
            .map(Result::unwrap)
            .collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.calls.lock().unwrap().clone()
    }

    pub fn finds_on(&self, name: &str) -> Vec<(Document, FindOptions)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Find {
                    collection,
                    filter,
                    options,
                } if collection == name => Some((filter, options)),
                _ => None,
            })
            .collect()
    }

    pub fn insert_batches(&self, name: &str) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::InsertMany { collection, count } if collection == name => Some(count),
                _ => None,
            })
            .collect()
    }

    pub fn bulk_batches(&self, name: &str) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::BulkWrite { collection, count } if collection == name => Some(count),
                _ => None,
            })
            .collect()
    }

    /// Documents handed out by cursors so far.
    pub fn pulled(&self) -> usize {
        self.log.pulled.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.log.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_finds_on(&self, name: &str) {
        *self.log.fail_finds_on.lock().unwrap() = Some(name.to_string());
    }
}

impl Store for RecordingStore {
    type Collection = RecordingCollection;

    fn collection(&self, name: &str) -> Result<RecordingCollection, StoreError> {
        Ok(RecordingCollection {
            inner: self.inner.collection(name)?,
            log: Arc::clone(&self.log),
        })
    }
}

#[derive(Clone)]
pub struct RecordingCollection {
    inner: MemoryCollection,
    log: Arc<Log>,
}

impl RecordingCollection {
    fn check_write(&self) -> Result<(), StoreError> {
        if self.log.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Storage("injected write failure".into()));
        }
        Ok(())
    }
}

impl Collection for RecordingCollection {
    type Cursor = RecordingCursor;

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn find(&self, filter: &Document, options: &FindOptions) -> Result<RecordingCursor, StoreError> {
        self.log.record(Call::Find {
            collection: self.name().to_string(),
            filter: filter.clone(),
            options: options.clone(),
        });
        if self.log.fail_finds_on.lock().unwrap().as_deref() == Some(self.name()) {
            return Err(StoreError::Storage("injected find failure".into()));
        }
        Ok(RecordingCursor {
            inner: self.inner.find(filter, options)?,
            log: Arc::clone(&self.log),
        })
    }

    fn insert_many(&self, docs: &[Document]) -> Result<u64, StoreError> {
        self.check_write()?;
        self.log.record(Call::InsertMany {
            collection: self.name().to_string(),
            count: docs.len(),
        });
        self.inner.insert_many(docs)
    }

    fn bulk_write(&self, ops: &[WriteModel]) -> Result<BulkWriteResult, StoreError> {
        self.check_write()?;
        self.log.record(Call::BulkWrite {
            collection: self.name().to_string(),
            count: ops.len(),
        });
        self.inner.bulk_write(ops)
    }

    fn delete_many(&self, filter: &Document) -> Result<u64, StoreError> {
        self.check_write()?;
        self.log.record(Call::DeleteMany {
            collection: self.name().to_string(),
            filter: filter.clone(),
        });
        self.inner.delete_many(filter)
    }
}

pub struct RecordingCursor {
    inner: MemoryCursor,
    log: Arc<Log>,
}

impl Iterator for RecordingCursor {
    type Item = Result<Document, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next();
        if let Some(Ok(_)) = item {
            self.log.pulled.fetch_add(1, Ordering::SeqCst);
        }
        item
    }
}

// ── Fixtures ────────────────────────────────────────────────────

/// `n` documents with integer ids `0..n`.
pub fn numbered(n: i32) -> Vec<Document> {
    (0..n).map(|i| doc! { "_id": i, "n": i }).collect()
}

pub fn ids(docs: &[Document]) -> Vec<i32> {
    docs.iter().map(|d| d.get_i32("_id").unwrap()).collect()
}

pub fn now_secs() -> i64 {
    bson::DateTime::now().timestamp_millis() / 1000
}

/// Orders 1 and 2 pointing at customers 9 and 8; only customer 9 exists.
pub fn orders_and_customers() -> RecordingStore {
    let store = RecordingStore::new();
    store.seed(
        "orders",
        vec![
            doc! { "_id": 1, "customer_id": 9, "created": 100 },
            doc! { "_id": 2, "customer_id": 8, "created": 100 },
        ],
    );
    store.seed("customers", vec![doc! { "_id": 9, "name": "A" }]);
    store
}
