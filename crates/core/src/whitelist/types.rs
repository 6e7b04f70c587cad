//! In-memory whitelist and the merge policy.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::broadcaster::BroadcasterName;

/// Broadcaster name to annotation mapping.
///
/// Names are already lowercase, so the map order is the case-insensitive
/// order the whitelist file is written in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Whitelist {
    entries: BTreeMap<BroadcasterName, String>,
}

impl Whitelist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry, returning the previous annotation.
    pub fn insert(&mut self, name: BroadcasterName, annotation: impl Into<String>) -> Option<String> {
        self.entries.insert(name, annotation.into())
    }

    pub fn get(&self, name: &BroadcasterName) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &BroadcasterName) -> bool {
        self.entries.contains_key(name)
    }

    /// Whether the broadcaster is present with a non-empty annotation.
    pub fn is_enabled(&self, name: &BroadcasterName) -> bool {
        self.get(name).is_some_and(|a| !a.is_empty())
    }

    /// Names with a non-empty annotation.
    pub fn enabled(&self) -> BTreeSet<BroadcasterName> {
        self.entries
            .iter()
            .filter(|(_, annotation)| !annotation.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Entries in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&BroadcasterName, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn enabled_count(&self) -> usize {
        self.entries.values().filter(|a| !a.is_empty()).count()
    }
}

impl FromIterator<(BroadcasterName, String)> for Whitelist {
    fn from_iter<T: IntoIterator<Item = (BroadcasterName, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Merge freshly discovered names into the previous whitelist.
///
/// The result holds every previous entry with its annotation untouched, plus
/// each discovered name not seen before with an empty annotation.
pub fn merge<'a>(
    discovered: impl IntoIterator<Item = &'a BroadcasterName>,
    previous: &Whitelist,
) -> Whitelist {
    let mut merged = previous.clone();
    for name in discovered {
        if !merged.contains(name) {
            merged.insert(name.clone(), String::new());
        }
    }
    merged
}
