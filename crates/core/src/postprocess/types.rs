//! Types for the post-processing module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of post-processing one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub output_path: PathBuf,
    /// Either "repair" or "move".
    pub method: String,
    pub duration_ms: u64,
}

/// Counts from a leftover repair pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairSummary {
    pub found: usize,
    pub processed: usize,
    pub failed: usize,
}
