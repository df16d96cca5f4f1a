use std::path::Path;

use beads_query::Sort;
use bson::Document;
use serde::{Deserialize, Serialize};

use crate::error::ChainError;
use crate::spec::{
    ChainSpec, Cutoff, DEFAULT_BATCH_SIZE, DEFAULT_CUTOFF_FIELD, JoinMode, JoinSpec,
    LookupOptions, Predicate, QuerySpec,
};

/// Serialized form of a lookup chain.
///
/// `query` documents are sent to the store; `filter` documents are
/// evaluated in-process after the read or join they belong to.
///
/// ```yaml
/// collection: orders
/// query: { status: open }
/// sort: [{ field: created, direction: desc }]
/// cutoff: { minutes: 60 }
/// stages:
///   - collection: customers
///     key: customer_id
///     self_key: _id
///     filter: { customers.active: true }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub collection: String,
    #[serde(default)]
    pub query: Document,
    #[serde(default)]
    pub sort: Option<Vec<Sort>>,
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    #[serde(default = "default_batch_size")]
    pub size: usize,
    #[serde(default)]
    pub skip: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub filter: Option<Document>,
    #[serde(default)]
    pub cutoff: Option<CutoffConfig>,
    #[serde(default)]
    pub stages: Vec<StageConfig>,
    #[serde(default = "default_batch_size")]
    pub output_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutoffConfig {
    #[serde(default = "default_cutoff_field")]
    pub field: String,
    pub minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub collection: String,
    pub key: String,
    #[serde(default)]
    pub self_key: Option<String>,
    #[serde(default)]
    pub mode: JoinMode,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub query: Option<Document>,
    #[serde(default)]
    pub sort: Vec<Sort>,
    #[serde(default)]
    pub filter: Option<Document>,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_cutoff_field() -> String {
    DEFAULT_CUTOFF_FIELD.to_string()
}

impl ChainConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, ChainError> {
        serde_yaml::from_str(s).map_err(|e| ChainError::Config(format!("invalid YAML: {e}")))
    }

    pub fn from_json_str(s: &str) -> Result<Self, ChainError> {
        serde_json::from_str(s).map_err(|e| ChainError::Config(format!("invalid JSON: {e}")))
    }

    /// Load from a `.json` file, or YAML for any other extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ChainError::Config(format!("cannot read {}: {e}", path.display())))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    pub fn to_spec(&self) -> Result<ChainSpec, ChainError> {
        let query = QuerySpec {
            filter: self.query.clone(),
            sort: self.sort.clone(),
            fields: self.fields.clone(),
            size: self.size,
            skip: self.skip,
            limit: self.limit,
        };
        let mut builder = ChainSpec::builder(&self.collection, query).output_size(self.output_size);
        if let Some(filter) = &self.filter {
            builder = builder.filter(Predicate::from_filter(filter)?);
        }
        if let Some(cutoff) = &self.cutoff {
            builder = builder.cutoff(Cutoff::new(cutoff.minutes).on_field(&cutoff.field));
        }
        for stage in &self.stages {
            builder = builder.join(stage.to_join()?);
        }
        builder.build()
    }
}

impl StageConfig {
    fn to_join(&self) -> Result<JoinSpec, ChainError> {
        let options = LookupOptions {
            self_key: self.self_key.clone(),
            mode: self.mode,
            fields: self.fields.clone(),
            filter: self.query.clone(),
            sort: self.sort.clone(),
        };
        let mut join = JoinSpec::new(&self.collection, &self.key).with_options(options);
        if let Some(filter) = &self.filter {
            join = join.with_predicate(Predicate::from_filter(filter)?);
        }
        Ok(join)
    }
}

impl TryFrom<ChainConfig> for ChainSpec {
    type Error = ChainError;

    fn try_from(config: ChainConfig) -> Result<Self, Self::Error> {
        config.to_spec()
    }
}

impl TryFrom<&ChainConfig> for ChainSpec {
    type Error = ChainError;

    fn try_from(config: &ChainConfig) -> Result<Self, Self::Error> {
        config.to_spec()
    }
}
