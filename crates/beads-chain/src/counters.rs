use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::spec::ChainSpec;

/// Counter label for documents read from the primary cursor.
pub const IN: &str = "in";
/// Counter label for documents that survived every stage.
pub const OUT: &str = "out";

/// Per-run document counts, in chain order: `in`, each distinct collection,
/// then `out`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counters {
    entries: Vec<(String, u64)>,
}

impl Counters {
    pub(crate) fn for_chain(spec: &ChainSpec) -> Self {
        let mut entries = vec![(IN.to_string(), 0)];
        entries.extend(spec.collections().into_iter().map(|name| (name.to_string(), 0)));
        entries.push((OUT.to_string(), 0));
        Self { entries }
    }

    pub(crate) fn add(&mut self, label: &str, n: usize) {
        if let Some((_, count)) = self.entries.iter_mut().find(|(l, _)| l == label) {
            *count += n as u64;
        }
    }

    pub fn get(&self, label: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, count)| *count)
    }

    pub fn input(&self) -> u64 {
        self.get(IN).unwrap_or(0)
    }

    pub fn output(&self) -> u64 {
        self.get(OUT).unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(l, c)| (l.as_str(), *c))
    }
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (label, count)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{label}={count}")?;
        }
        Ok(())
    }
}

impl Serialize for Counters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, count) in &self.entries {
            map.serialize_entry(label, count)?;
        }
        map.end()
    }
}
