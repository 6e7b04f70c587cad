//! Error types for the capture module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while invoking the capture tool.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Capture binary not found.
    #[error("capture tool not found at path: {path}")]
    ToolNotFound { path: PathBuf },

    /// I/O error while spawning or waiting on the tool.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
