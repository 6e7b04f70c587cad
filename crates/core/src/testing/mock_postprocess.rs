//! Mock post-processor for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::postprocess::{PostProcessError, PostProcessor, ProcessOutcome};

/// Mock implementation of the PostProcessor trait.
///
/// Moves the raw file to the processed path and records the raw path.
#[derive(Debug, Default)]
pub struct MockPostProcessor {
    processed: Arc<RwLock<Vec<PathBuf>>>,
    /// If set, every call fails and leaves the raw file in place.
    fail: Arc<RwLock<bool>>,
}

impl MockPostProcessor {
    /// Create a new mock post-processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail.
    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    /// Raw paths handed to `process`, in call order.
    pub async fn processed(&self) -> Vec<PathBuf> {
        self.processed.read().await.clone()
    }
}

#[async_trait]
impl PostProcessor for MockPostProcessor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn process(
        &self,
        raw: &Path,
        processed: &Path,
    ) -> Result<ProcessOutcome, PostProcessError> {
        self.processed.write().await.push(raw.to_path_buf());

        if *self.fail.read().await {
            return Err(PostProcessError::repair_failed("mock failure", None));
        }
        if let Some(parent) = processed.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(raw, processed).await?;

        Ok(ProcessOutcome {
            output_path: processed.to_path_buf(),
            method: "mock".to_string(),
            duration_ms: 0,
        })
    }
}
