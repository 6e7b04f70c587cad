//! Post-processing of finished captures.
//!
//! Two strategies are available: [`FfmpegRepairer`] remuxes a capture with
//! ffmpeg while ignoring decode errors, and [`MoveProcessor`] moves it as is.
//! Failures are reported to the caller, who logs them; they never abort the
//! enclosing capture job.

mod error;
mod ffmpeg;
mod mover;
mod traits;
mod types;

pub use error::PostProcessError;
pub use ffmpeg::FfmpegRepairer;
pub use mover::MoveProcessor;
pub use traits::PostProcessor;
pub use types::{ProcessOutcome, RepairSummary};

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use crate::config::{PostProcessConfig, PostProcessMode};
use crate::metrics;

/// Build the post-processor selected by configuration.
pub fn create_post_processor(config: &PostProcessConfig) -> Arc<dyn PostProcessor> {
    match config.mode {
        PostProcessMode::Repair => Arc::new(FfmpegRepairer::new(config)),
        PostProcessMode::Move => Arc::new(MoveProcessor::new()),
    }
}

/// Process one file and record the outcome in metrics and logs.
///
/// Never fails: a post-processing error only affects this file.
pub async fn process_logged(
    processor: &dyn PostProcessor,
    raw: &Path,
    processed: &Path,
) -> Option<ProcessOutcome> {
    match processor.process(raw, processed).await {
        Ok(outcome) => {
            metrics::POSTPROCESS_RESULTS
                .with_label_values(&[processor.name(), "success"])
                .inc();
            info!(
                raw = %raw.display(),
                output = %outcome.output_path.display(),
                method = %outcome.method,
                duration_ms = outcome.duration_ms,
                "Post-processing finished"
            );
            Some(outcome)
        }
        Err(e) => {
            metrics::POSTPROCESS_RESULTS
                .with_label_values(&[processor.name(), "failed"])
                .inc();
            if let PostProcessError::RepairFailed {
                stderr: Some(ref stderr),
                ..
            } = e
            {
                error!(raw = %raw.display(), stderr = %stderr, "Post-processing failed: {}", e);
            } else {
                error!(raw = %raw.display(), "Post-processing failed: {}", e);
            }
            None
        }
    }
}

/// Post-process every regular file left in `raw_dir` by an earlier run.
///
/// Each file goes to `processed_dir` under the same name. Files that fail
/// stay in place for the next pass.
pub async fn repair_leftovers(
    processor: &dyn PostProcessor,
    raw_dir: &Path,
    processed_dir: &Path,
) -> Result<RepairSummary, PostProcessError> {
    let mut leftovers = Vec::new();
    let mut entries = tokio::fs::read_dir(raw_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            leftovers.push(entry.file_name());
        }
    }
    leftovers.sort();

    let mut summary = RepairSummary {
        found: leftovers.len(),
        ..Default::default()
    };
    if leftovers.is_empty() {
        return Ok(summary);
    }

    info!(
        dir = %raw_dir.display(),
        count = leftovers.len(),
        "Processing previously recorded files"
    );
    for file_name in leftovers {
        let raw = raw_dir.join(&file_name);
        let processed = processed_dir.join(&file_name);
        match process_logged(processor, &raw, &processed).await {
            Some(_) => summary.processed += 1,
            None => summary.failed += 1,
        }
    }
    Ok(summary)
}
