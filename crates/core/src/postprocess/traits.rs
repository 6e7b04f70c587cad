//! Trait definitions for the post-processing module.

use async_trait::async_trait;
use std::path::Path;

use super::error::PostProcessError;
use super::types::ProcessOutcome;

/// Hands a finished raw capture over to the processed directory.
#[async_trait]
pub trait PostProcessor: Send + Sync {
    /// Returns the name of this post-processor implementation.
    fn name(&self) -> &str;

    /// Produce `processed` from `raw`.
    ///
    /// On success the raw file no longer exists.
    async fn process(&self, raw: &Path, processed: &Path)
        -> Result<ProcessOutcome, PostProcessError>;

    /// Validates that external tools are available.
    async fn validate(&self) -> Result<(), PostProcessError> {
        Ok(())
    }
}
