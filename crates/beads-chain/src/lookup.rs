use std::collections::{HashMap, HashSet};

use beads_query::{FindOptions, get_path, is_truthy};
use beads_store::Collection;
use bson::{Bson, Document, doc};
use tracing::debug;

use crate::error::ChainError;
use crate::key::LookupKey;
use crate::spec::{JoinMode, LookupOptions};

/// Enrich `docs` in place with matching documents from `collection`.
///
/// Reads `key` from each document, fetches every target whose `self_key`
/// is among those values in a single query, and stores the match (or all
/// matches in multi mode) under a field named after the collection.
/// Documents with a missing or falsy key are left untouched, and no query
/// is issued when none of them has one.
pub fn lookup<C: Collection>(
    collection: &C,
    docs: &mut [Document],
    key: &str,
    options: &LookupOptions,
) -> Result<(), ChainError> {
    let target = collection.name();
    if target == "_id" {
        return Err(ChainError::Config(
            "lookup target collection cannot be named '_id'".into(),
        ));
    }
    let self_key = options.self_key.as_deref().unwrap_or(key);

    // Gather
    let mut doc_keys = Vec::with_capacity(docs.len());
    let mut seen = HashSet::new();
    let mut values = Vec::new();
    for doc in docs.iter() {
        match get_path(doc, key).filter(|v| is_truthy(v)) {
            Some(value) => {
                let lookup_key = LookupKey::from_bson(value);
                if seen.insert(lookup_key.clone()) {
                    values.push(value.clone());
                }
                doc_keys.push(Some(lookup_key));
            }
            None => doc_keys.push(None),
        }
    }
    if values.is_empty() {
        debug!(collection = target, "lookup skipped, no keys");
        return Ok(());
    }
    let value_count = values.len();

    // Query
    let mut filter = Document::new();
    filter.insert(self_key, doc! { "$in": values });
    if let Some(extra) = &options.filter {
        for (k, v) in extra {
            filter.insert(k.clone(), v.clone());
        }
    }
    let mut find = FindOptions::default().with_sort(options.sort.clone());
    if !options.fields.is_empty() {
        let mut projection = options.fields.clone();
        if !projection.iter().any(|f| f == self_key) {
            projection.push(self_key.to_string());
        }
        find = find.with_projection(projection);
    }
    let cursor = collection
        .find(&filter, &find)
        .map_err(|e| ChainError::query(target, e))?;

    // Index
    let mut index: HashMap<LookupKey, Vec<Document>> = HashMap::new();
    let mut matched = 0usize;
    for found in cursor {
        let found = found.map_err(|e| ChainError::query(target, e))?;
        matched += 1;
        let Some(value) = get_path(&found, self_key) else {
            continue;
        };
        let lookup_key = LookupKey::from_bson(value);
        index.entry(lookup_key).or_default().push(found);
    }
    debug!(collection = target, values = value_count, matched, "lookup");

    // Attach
    for (doc, lookup_key) in docs.iter_mut().zip(doc_keys) {
        let Some(lookup_key) = lookup_key else {
            continue;
        };
        let found = index.get(&lookup_key);
        let value = match options.mode {
            JoinMode::Single => found
                .and_then(|m| m.last())
                .map(|d| Bson::Document(d.clone()))
                .unwrap_or(Bson::Null),
            JoinMode::Multi => Bson::Array(
                found
                    .map(|m| m.iter().cloned().map(Bson::Document).collect())
                    .unwrap_or_default(),
            ),
        };
        doc.insert(target, value);
    }
    Ok(())
}
