use std::fmt;
use std::sync::Arc;

use beads_query::{Expression, FindOptions, Sort, id_ascending, parse_filter};
use bson::Document;
use serde::{Deserialize, Serialize};

use crate::counters::{IN, OUT};
use crate::error::ChainError;

/// Default size for source batches, output batches and bulk flushes.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

pub(crate) const DEFAULT_CUTOFF_FIELD: &str = "created";

// ── Query ───────────────────────────────────────────────────────

/// How to read the primary collection.
///
/// `size` is consumed by the batcher and never reaches the store; `fields`
/// becomes an inclusion projection.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub filter: Document,
    /// `None` reads in `_id` ascending order.
    pub sort: Option<Vec<Sort>>,
    pub fields: Option<Vec<String>>,
    pub size: usize,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            filter: Document::new(),
            sort: None,
            fields: None,
            size: DEFAULT_BATCH_SIZE,
            skip: None,
            limit: None,
        }
    }
}

impl QuerySpec {
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn with_sort(mut self, sort: Vec<Sort>) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ChainError> {
        if self.size == 0 {
            return Err(ChainError::Config("batch size must be at least 1".into()));
        }
        Ok(())
    }

    pub(crate) fn find_options(&self) -> FindOptions {
        FindOptions {
            projection: self.fields.clone(),
            sort: self.sort.clone().unwrap_or_else(id_ascending),
            skip: self.skip,
            limit: self.limit,
        }
    }
}

// ── Joins ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinMode {
    /// Attach one matching document, or `null`.
    #[default]
    Single,
    /// Attach every matching document as an array, `[]` when none match.
    Multi,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupOptions {
    /// Field on the target collection to match against. Defaults to the
    /// lookup key.
    pub self_key: Option<String>,
    pub mode: JoinMode,
    /// Inclusion projection for the target documents. `self_key` is added
    /// automatically.
    pub fields: Vec<String>,
    /// Extra store filter merged into the join query. Its entries replace
    /// the generated `$in` clause when they name the same field.
    pub filter: Option<Document>,
    pub sort: Vec<Sort>,
}

impl LookupOptions {
    pub fn with_self_key(mut self, self_key: impl Into<String>) -> Self {
        self.self_key = Some(self_key.into());
        self
    }

    pub fn with_mode(mut self, mode: JoinMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn multi(self) -> Self {
        self.with_mode(JoinMode::Multi)
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_filter(mut self, filter: Document) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_sort(mut self, sort: Vec<Sort>) -> Self {
        self.sort = sort;
        self
    }
}

/// In-process document filter applied after a read or join.
#[derive(Clone)]
pub enum Predicate {
    /// A filter document compiled once and evaluated with store semantics.
    Filter(Expression),
    Func(Arc<dyn Fn(&Document) -> bool + Send + Sync>),
}

impl Predicate {
    pub fn new(f: impl Fn(&Document) -> bool + Send + Sync + 'static) -> Self {
        Predicate::Func(Arc::new(f))
    }

    pub fn from_filter(filter: &Document) -> Result<Self, ChainError> {
        parse_filter(filter)
            .map(Predicate::Filter)
            .map_err(|e| ChainError::Config(e.to_string()))
    }

    pub fn test(&self, doc: &Document) -> bool {
        match self {
            Predicate::Filter(expr) => expr.matches(doc),
            Predicate::Func(f) => f(doc),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Filter(expr) => f.debug_tuple("Filter").field(expr).finish(),
            Predicate::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// One lookup stage: read `key` from every working document, fetch the
/// matching documents from `collection` and attach them under the
/// collection's name.
#[derive(Debug, Clone)]
pub struct JoinSpec {
    pub collection: String,
    pub key: String,
    pub options: LookupOptions,
    pub predicate: Option<Predicate>,
}

impl JoinSpec {
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
            options: LookupOptions::default(),
            predicate: None,
        }
    }

    pub fn with_options(mut self, options: LookupOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }
}

/// Recency cutoff. Documents whose `field` is not strictly newer than
/// `now - minutes` are dropped, and the first batch left empty by the
/// cutoff ends the run.
///
/// Numeric field values are epoch seconds; BSON datetimes are compared as is.
/// A cutoff of zero minutes is disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cutoff {
    pub field: String,
    pub minutes: u64,
}

impl Cutoff {
    pub fn new(minutes: u64) -> Self {
        Self {
            field: DEFAULT_CUTOFF_FIELD.to_string(),
            minutes,
        }
    }

    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }
}

// ── Chain ───────────────────────────────────────────────────────

/// A validated lookup chain. Build with [`ChainSpec::builder`].
#[derive(Debug, Clone)]
pub struct ChainSpec {
    collection: String,
    query: QuerySpec,
    predicate: Option<Predicate>,
    stages: Vec<JoinSpec>,
    cutoff: Option<Cutoff>,
    output_size: usize,
}

impl ChainSpec {
    pub fn builder(collection: impl Into<String>, query: QuerySpec) -> ChainSpecBuilder {
        ChainSpecBuilder {
            spec: ChainSpec {
                collection: collection.into(),
                query,
                predicate: None,
                stages: Vec::new(),
                cutoff: None,
                output_size: DEFAULT_BATCH_SIZE,
            },
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn query(&self) -> &QuerySpec {
        &self.query
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    pub fn stages(&self) -> &[JoinSpec] {
        &self.stages
    }

    pub fn cutoff(&self) -> Option<&Cutoff> {
        self.cutoff.as_ref()
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Distinct collection names, primary first, then stages in order.
    pub fn collections(&self) -> Vec<&str> {
        let mut names = vec![self.collection.as_str()];
        for stage in &self.stages {
            if !names.contains(&stage.collection.as_str()) {
                names.push(&stage.collection);
            }
        }
        names
    }

    fn validate(&self) -> Result<(), ChainError> {
        check_collection_name(&self.collection)?;
        self.query.validate()?;
        if self.output_size == 0 {
            return Err(ChainError::Config(
                "output batch size must be at least 1".into(),
            ));
        }
        for stage in &self.stages {
            check_collection_name(&stage.collection)?;
            if stage.collection == "_id" {
                return Err(ChainError::Config(
                    "lookup target collection cannot be named '_id'".into(),
                ));
            }
            if stage.key.is_empty() {
                return Err(ChainError::Config(format!(
                    "lookup into '{}' has an empty key",
                    stage.collection
                )));
            }
            if stage.options.self_key.as_deref() == Some("") {
                return Err(ChainError::Config(format!(
                    "lookup into '{}' has an empty self_key",
                    stage.collection
                )));
            }
        }
        if let Some(cutoff) = &self.cutoff {
            if cutoff.field.is_empty() {
                return Err(ChainError::Config("cutoff field cannot be empty".into()));
            }
        }
        Ok(())
    }
}

fn check_collection_name(name: &str) -> Result<(), ChainError> {
    if name.is_empty() {
        return Err(ChainError::Config("collection name cannot be empty".into()));
    }
    if name == IN || name == OUT {
        return Err(ChainError::Config(format!(
            "collection name '{name}' collides with a counter label"
        )));
    }
    Ok(())
}

pub struct ChainSpecBuilder {
    spec: ChainSpec,
}

impl ChainSpecBuilder {
    /// Post-filter for primary documents.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.spec.predicate = Some(predicate);
        self
    }

    pub fn join(mut self, stage: JoinSpec) -> Self {
        self.spec.stages.push(stage);
        self
    }

    pub fn cutoff(mut self, cutoff: Cutoff) -> Self {
        self.spec.cutoff = Some(cutoff);
        self
    }

    pub fn output_size(mut self, size: usize) -> Self {
        self.spec.output_size = size;
        self
    }

    pub fn build(self) -> Result<ChainSpec, ChainError> {
        self.spec.validate()?;
        Ok(self.spec)
    }
}
