//! In-memory whitelist store and history log.

use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use crate::broadcaster::BroadcasterName;
use crate::whitelist::{HistoryLog, StoreError, Whitelist, WhitelistStore};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn injected_failure() -> StoreError {
    StoreError::io(
        PathBuf::from("memory"),
        std::io::Error::new(std::io::ErrorKind::Other, "injected failure"),
    )
}

/// Whitelist held in memory, with save counting and failure injection.
#[derive(Debug, Default)]
pub struct MemoryWhitelistStore {
    whitelist: Mutex<Whitelist>,
    saves: Mutex<usize>,
    fail_loads: Mutex<bool>,
    fail_saves: Mutex<bool>,
}

impl MemoryWhitelistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `(name, annotation)` entries.
    pub fn with_entries(entries: &[(&str, &str)]) -> Self {
        let store = Self::new();
        *lock(&store.whitelist) = super::fixtures::whitelist(entries);
        store
    }

    /// Simulate an operator editing the file between cycles.
    pub fn set_annotation(&self, name: &str, annotation: &str) {
        lock(&self.whitelist).insert(super::fixtures::name(name), annotation);
    }

    pub fn contents(&self) -> Whitelist {
        lock(&self.whitelist).clone()
    }

    pub fn save_count(&self) -> usize {
        *lock(&self.saves)
    }

    pub fn set_fail_loads(&self, fail: bool) {
        *lock(&self.fail_loads) = fail;
    }

    pub fn set_fail_saves(&self, fail: bool) {
        *lock(&self.fail_saves) = fail;
    }
}

impl WhitelistStore for MemoryWhitelistStore {
    fn load(&self) -> Result<Whitelist, StoreError> {
        if *lock(&self.fail_loads) {
            return Err(injected_failure());
        }
        Ok(lock(&self.whitelist).clone())
    }

    fn save(&self, whitelist: &Whitelist) -> Result<(), StoreError> {
        if *lock(&self.fail_saves) {
            return Err(injected_failure());
        }
        *lock(&self.whitelist) = whitelist.clone();
        *lock(&self.saves) += 1;
        Ok(())
    }
}

/// History records held in memory.
#[derive(Debug, Default)]
pub struct MemoryHistoryLog {
    records: Mutex<Vec<(BroadcasterName, DateTime<Local>)>>,
}

impl MemoryHistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(BroadcasterName, DateTime<Local>)> {
        lock(&self.records).clone()
    }

    /// Recorded broadcaster names, in append order.
    pub fn names(&self) -> Vec<String> {
        lock(&self.records)
            .iter()
            .map(|(name, _)| name.to_string())
            .collect()
    }
}

impl HistoryLog for MemoryHistoryLog {
    fn append(&self, name: &BroadcasterName, at: DateTime<Local>) -> Result<(), StoreError> {
        lock(&self.records).push((name.clone(), at));
        Ok(())
    }
}
