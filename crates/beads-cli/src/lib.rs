use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use beads_chain::{ChainConfig, ChainError, ChainRunner, ChainSpec, Counters};
use beads_store::{Collection, MemoryStore, Store, StoreError};
use bson::Document;
use serde::Deserialize;
use tracing::info;

/// Environment variable consulted when no config path is given.
pub const CONFIG_ENV: &str = "BEADS_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),

    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid seed file {path}: {source}")]
    Seed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("output error: {0}")]
    Output(#[from] std::io::Error),

    #[error("cannot encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A chain plus the files used to seed the in-memory store.
///
/// Seed paths are relative to the config file and hold a JSON array of
/// documents each.
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    #[serde(flatten)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub seed: BTreeMap<String, PathBuf>,
}

impl CliConfig {
    pub fn from_path(path: &Path) -> Result<Self, CliError> {
        let text = read(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&text)
                .map_err(|e| CliError::Config(format!("{}: {e}", path.display()))),
            _ => serde_yaml::from_str(&text)
                .map_err(|e| CliError::Config(format!("{}: {e}", path.display()))),
        }
    }
}

fn read(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn load_seed(path: &Path) -> Result<Vec<Document>, CliError> {
    let text = read(path)?;
    serde_json::from_str(&text).map_err(|source| CliError::Seed {
        path: path.to_path_buf(),
        source,
    })
}

/// Seed a memory store from `config`, run its chain and write every output
/// document to `out` as one JSON line.
pub fn run(config: &CliConfig, base: &Path, out: &mut impl Write) -> Result<Counters, CliError> {
    let spec = ChainSpec::try_from(&config.chain)?;

    let store = MemoryStore::new();
    for (name, file) in &config.seed {
        let docs = load_seed(&base.join(file))?;
        let inserted = store.collection(name)?.insert_many(&docs)?;
        info!(collection = %name, documents = inserted, "seeded");
    }

    let runner = ChainRunner::new(&store);
    let mut lookups = runner.lookups(&spec)?;
    for batch in lookups.by_ref() {
        for doc in batch? {
            serde_json::to_writer(&mut *out, &doc)?;
            out.write_all(b"\n")?;
        }
    }
    out.flush()?;
    Ok(lookups.into_counts())
}

/// Load the config at `path` and [`run`] it, resolving seed files next to it.
pub fn run_file(path: &Path, out: &mut impl Write) -> Result<Counters, CliError> {
    let config = CliConfig::from_path(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    run(&config, base, out)
}
