//! Mock liveness prober for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::broadcaster::BroadcasterName;
use crate::prober::{LiveSet, LivenessProber, ProbeError, StreamMetadata};

/// Mock implementation of the LivenessProber trait.
///
/// Queued results are returned first, in order. Once a queue is empty,
/// `list_live` returns the configured live set (offline when unset or
/// empty) and `check_one` answers offline.
#[derive(Debug, Default)]
pub struct MockProber {
    /// Queued listing results.
    live_results: Arc<RwLock<VecDeque<Result<LiveSet, ProbeError>>>>,
    /// Listing returned once the queue is drained.
    live: Arc<RwLock<LiveSet>>,
    /// Queued single-broadcaster results.
    check_results: Arc<RwLock<VecDeque<Result<StreamMetadata, ProbeError>>>>,
    /// Category name to id.
    categories: Arc<RwLock<HashMap<String, String>>>,
    /// Whether credential refresh fails.
    refresh_fails: Arc<RwLock<bool>>,
    list_calls: AtomicUsize,
    check_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
}

impl MockProber {
    /// Create a new mock prober.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one `list_live` result.
    pub async fn push_live(&self, result: Result<LiveSet, ProbeError>) {
        self.live_results.write().await.push_back(result);
    }

    /// Set the listing returned when no result is queued.
    pub async fn set_live(&self, live: LiveSet) {
        *self.live.write().await = live;
    }

    /// Queue one `check_one` result.
    pub async fn push_check(&self, result: Result<StreamMetadata, ProbeError>) {
        self.check_results.write().await.push_back(result);
    }

    /// Register a category for `resolve_category_id`.
    pub async fn add_category(&self, name: &str, id: &str) {
        self.categories
            .write()
            .await
            .insert(name.to_lowercase(), id.to_string());
    }

    /// Make credential refreshes fail.
    pub async fn set_refresh_fails(&self, fails: bool) {
        *self.refresh_fails.write().await = fails;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LivenessProber for MockProber {
    fn name(&self) -> &str {
        "mock"
    }

    async fn resolve_category_id(&self, category: &str) -> Result<String, ProbeError> {
        self.categories
            .read()
            .await
            .get(&category.to_lowercase())
            .cloned()
            .ok_or_else(|| ProbeError::NotFound(format!("category {}", category)))
    }

    async fn list_live(&self, _category_id: &str, _language: &str) -> Result<LiveSet, ProbeError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = self.live_results.write().await.pop_front() {
            return result;
        }
        let live = self.live.read().await.clone();
        if live.is_empty() {
            Err(ProbeError::Offline)
        } else {
            Ok(live)
        }
    }

    async fn check_one(&self, _name: &BroadcasterName) -> Result<StreamMetadata, ProbeError> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        self.check_results
            .write()
            .await
            .pop_front()
            .unwrap_or(Err(ProbeError::Offline))
    }

    async fn refresh_credentials(&self) -> Result<(), ProbeError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if *self.refresh_fails.read().await {
            Err(ProbeError::Unavailable("token endpoint down".to_string()))
        } else {
            Ok(())
        }
    }
}
