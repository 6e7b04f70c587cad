//! Pass-through post-processing: move the raw capture as is.

use async_trait::async_trait;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

use super::error::PostProcessError;
use super::traits::PostProcessor;
use super::types::ProcessOutcome;

/// Moves captures into the processed directory without touching them.
#[derive(Debug, Clone, Default)]
pub struct MoveProcessor;

impl MoveProcessor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PostProcessor for MoveProcessor {
    fn name(&self) -> &str {
        "move"
    }

    async fn process(
        &self,
        raw: &Path,
        processed: &Path,
    ) -> Result<ProcessOutcome, PostProcessError> {
        let start = Instant::now();

        if !tokio::fs::try_exists(raw).await.unwrap_or(false) {
            return Err(PostProcessError::InputNotFound {
                path: raw.to_path_buf(),
            });
        }

        if let Some(parent) = processed.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|_| {
                PostProcessError::OutputDirectoryFailed {
                    path: parent.to_path_buf(),
                }
            })?;
        }

        if let Err(e) = tokio::fs::rename(raw, processed).await {
            // Rename cannot cross filesystems; fall back to copy + remove.
            debug!(raw = %raw.display(), "Rename failed ({}), copying instead", e);
            tokio::fs::copy(raw, processed).await?;
            tokio::fs::remove_file(raw).await?;
        }

        Ok(ProcessOutcome {
            output_path: processed.to_path_buf(),
            method: "move".to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
