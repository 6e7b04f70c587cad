//! Mock capture tool for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::broadcaster::BroadcasterName;
use crate::capture::{CaptureError, CaptureExit, CaptureTool};

/// A capture invocation, for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCapture {
    pub broadcaster: BroadcasterName,
    pub output: PathBuf,
}

/// Mock implementation of the CaptureTool trait.
///
/// Writes a small payload to the output path (unless built with
/// [`MockCaptureTool::without_output`]) and records every call.
#[derive(Debug)]
pub struct MockCaptureTool {
    captures: Arc<RwLock<Vec<RecordedCapture>>>,
    writes_output: bool,
    fails: bool,
    /// Simulated capture duration.
    duration: Arc<RwLock<Duration>>,
}

impl Default for MockCaptureTool {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCaptureTool {
    /// Create a mock that produces a capture file.
    pub fn new() -> Self {
        Self {
            captures: Arc::new(RwLock::new(Vec::new())),
            writes_output: true,
            fails: false,
            duration: Arc::new(RwLock::new(Duration::ZERO)),
        }
    }

    /// Create a mock that exits without writing anything.
    pub fn without_output() -> Self {
        Self {
            writes_output: false,
            ..Self::new()
        }
    }

    /// Create a mock whose invocation errors, as if the tool were missing.
    pub fn failing() -> Self {
        Self {
            writes_output: false,
            fails: true,
            ..Self::new()
        }
    }

    /// Make each capture take this long.
    pub async fn set_duration(&self, duration: Duration) {
        *self.duration.write().await = duration;
    }

    /// Get all recorded captures.
    pub async fn captured(&self) -> Vec<RecordedCapture> {
        self.captures.read().await.clone()
    }
}

#[async_trait]
impl CaptureTool for MockCaptureTool {
    fn name(&self) -> &str {
        "mock"
    }

    async fn capture(
        &self,
        broadcaster: &BroadcasterName,
        output: &Path,
    ) -> Result<CaptureExit, CaptureError> {
        self.captures.write().await.push(RecordedCapture {
            broadcaster: broadcaster.clone(),
            output: output.to_path_buf(),
        });

        let duration = *self.duration.read().await;
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }

        if self.fails {
            return Err(CaptureError::ToolNotFound {
                path: PathBuf::from("mock-capture"),
            });
        }
        if self.writes_output {
            tokio::fs::write(output, b"captured stream").await?;
        }
        Ok(CaptureExit {
            success: self.writes_output,
            code: Some(if self.writes_output { 0 } else { 1 }),
        })
    }
}
