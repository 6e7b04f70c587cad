//! FFmpeg-based repair: stream copy ignoring decode errors.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::PostProcessConfig;

use super::error::PostProcessError;
use super::traits::PostProcessor;
use super::types::ProcessOutcome;

/// Remuxes captures through ffmpeg and deletes the raw file on success.
pub struct FfmpegRepairer {
    ffmpeg_path: PathBuf,
    log_level: String,
}

impl FfmpegRepairer {
    pub fn new(config: &PostProcessConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            log_level: config.log_level.clone(),
        }
    }

    /// Builds ffmpeg arguments for an error-tolerant stream copy.
    fn build_args(&self, raw: &Path, processed: &Path) -> Vec<String> {
        vec![
            "-nostdin".to_string(),
            "-y".to_string(),
            "-err_detect".to_string(),
            "ignore_err".to_string(),
            "-i".to_string(),
            raw.to_string_lossy().to_string(),
            "-c".to_string(),
            "copy".to_string(),
            "-loglevel".to_string(),
            self.log_level.clone(),
            processed.to_string_lossy().to_string(),
        ]
    }

    fn map_spawn_error(&self, e: std::io::Error) -> PostProcessError {
        if e.kind() == std::io::ErrorKind::NotFound {
            PostProcessError::FfmpegNotFound {
                path: self.ffmpeg_path.clone(),
            }
        } else {
            PostProcessError::Io(e)
        }
    }
}

#[async_trait]
impl PostProcessor for FfmpegRepairer {
    fn name(&self) -> &str {
        "ffmpeg"
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

        let args = self.build_args(raw, processed);
        debug!(raw = %raw.display(), "Running ffmpeg repair");

        let output = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.map_spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(PostProcessError::repair_failed(
                format!("ffmpeg exited with {}", output.status),
                (!stderr.is_empty()).then_some(stderr),
            ));
        }

        if let Err(e) = tokio::fs::remove_file(raw).await {
            warn!(raw = %raw.display(), "Repaired but could not remove raw file: {}", e);
            return Err(PostProcessError::Io(e));
        }

        Ok(ProcessOutcome {
            output_path: processed.to_path_buf(),
            method: "repair".to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn validate(&self) -> Result<(), PostProcessError> {
        Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| self.map_spawn_error(e))?;
        Ok(())
    }
}
