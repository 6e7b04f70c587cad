//! Error types for the post-processing module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while post-processing a capture.
#[derive(Debug, Error)]
pub enum PostProcessError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// Raw capture file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Output directory does not exist and could not be created.
    #[error("Failed to create output directory: {path}")]
    OutputDirectoryFailed { path: PathBuf },

    /// FFmpeg exited unsuccessfully; the raw file is kept.
    #[error("Repair failed: {reason}")]
    RepairFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// I/O error while moving or deleting files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PostProcessError {
    /// Creates a new repair failed error with stderr output.
    pub fn repair_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::RepairFailed {
            reason: reason.into(),
            stderr,
        }
    }
}
