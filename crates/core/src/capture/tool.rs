//! External capture tool invocation.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::broadcaster::BroadcasterName;
use crate::config::CaptureConfig;

use super::error::CaptureError;

/// Stderr lines kept for the failure log.
const STDERR_TAIL_LINES: usize = 5;

/// Read `stream` to the end, keeping only its last `keep` lines.
async fn read_tail<R: AsyncRead + Unpin>(stream: R, keep: usize) -> VecDeque<String> {
    let mut tail = VecDeque::with_capacity(keep + 1);
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tail.push_back(line);
        if tail.len() > keep {
            tail.pop_front();
        }
    }
    tail
}

/// How the capture tool exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureExit {
    pub success: bool,
    pub code: Option<i32>,
}

/// Records a live stream to a file.
#[async_trait]
pub trait CaptureTool: Send + Sync {
    /// Returns the name of this capture tool.
    fn name(&self) -> &str;

    /// Record `broadcaster` into `output` until the stream ends or the tool
    /// exits. Blocks the calling task for the whole capture.
    async fn capture(
        &self,
        broadcaster: &BroadcasterName,
        output: &Path,
    ) -> Result<CaptureExit, CaptureError>;

    /// Validates that the tool is installed.
    async fn validate(&self) -> Result<(), CaptureError> {
        Ok(())
    }
}

/// Streamlink-backed capture.
pub struct StreamlinkCapture {
    config: CaptureConfig,
}

impl StreamlinkCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    /// Builds streamlink arguments.
    fn build_args(&self, broadcaster: &BroadcasterName, output: &Path) -> Vec<String> {
        let mut args = Vec::new();
        if self.config.disable_ads {
            args.push("--twitch-disable-ads".to_string());
        }
        if !self.config.quality_exclusion.is_empty() {
            args.extend([
                "--stream-sorting-excludes".to_string(),
                self.config.quality_exclusion.clone(),
            ]);
        }
        args.extend([
            format!("twitch.tv/{}", broadcaster),
            self.config.quality.clone(),
            "-o".to_string(),
            output.to_string_lossy().to_string(),
        ]);
        args
    }

    fn map_spawn_error(&self, e: std::io::Error) -> CaptureError {
        if e.kind() == std::io::ErrorKind::NotFound {
            CaptureError::ToolNotFound {
                path: self.config.streamlink_path.clone(),
            }
        } else {
            CaptureError::Io(e)
        }
    }
}

#[async_trait]
impl CaptureTool for StreamlinkCapture {
    fn name(&self) -> &str {
        "streamlink"
    }

    async fn capture(
        &self,
        broadcaster: &BroadcasterName,
        output: &Path,
    ) -> Result<CaptureExit, CaptureError> {
        let args = self.build_args(broadcaster, output);
        debug!(broadcaster = %broadcaster, ?args, "Starting streamlink");

        let mut child = Command::new(&self.config.streamlink_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.map_spawn_error(e))?;

        // Drained as it arrives; only a bounded tail is held.
        let tail = match child.stderr.take() {
            Some(stderr) => read_tail(stderr, STDERR_TAIL_LINES).await,
            None => VecDeque::new(),
        };
        let status = child.wait().await?;

        if !status.success() {
            warn!(
                broadcaster = %broadcaster,
                status = %status,
                stderr = %Vec::from(tail).join(" | "),
                "streamlink exited unsuccessfully"
            );
        }

        Ok(CaptureExit {
            success: status.success(),
            code: status.code(),
        })
    }

    async fn validate(&self) -> Result<(), CaptureError> {
        Command::new(&self.config.streamlink_path)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| self.map_spawn_error(e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn name(s: &str) -> BroadcasterName {
        BroadcasterName::new(s).unwrap()
    }

    #[test]
    fn test_build_args_defaults() {
        let tool = StreamlinkCapture::new(CaptureConfig::default());
        let args = tool.build_args(&name("alice"), Path::new("/rec/alice/x.mp4"));
        assert_eq!(
            args,
            vec![
                "--twitch-disable-ads",
                "--stream-sorting-excludes",
                ">720p30",
                "twitch.tv/alice",
                "high,best",
                "-o",
                "/rec/alice/x.mp4"
            ]
        );
    }

    #[test]
    fn test_build_args_without_ads_flag_or_exclusion() {
        let tool = StreamlinkCapture::new(CaptureConfig {
            disable_ads: false,
            quality_exclusion: String::new(),
            quality: "best".to_string(),
            ..Default::default()
        });
        let args = tool.build_args(&name("bob"), Path::new("out.mp4"));
        assert_eq!(args, vec!["twitch.tv/bob", "best", "-o", "out.mp4"]);
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let tool = StreamlinkCapture::new(CaptureConfig {
            streamlink_path: PathBuf::from("/nonexistent/streamlink"),
            ..Default::default()
        });
        let err = tool
            .capture(&name("alice"), Path::new("/tmp/never.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::ToolNotFound { .. }));
        assert!(tool.validate().await.is_err());
    }

    #[tokio::test]
    async fn test_read_tail_keeps_last_lines() {
        let input: String = (1..=1000).map(|i| format!("line {}\n", i)).collect();
        let tail = read_tail(input.as_bytes(), 5).await;
        assert_eq!(
            Vec::from(tail),
            vec!["line 996", "line 997", "line 998", "line 999", "line 1000"]
        );

        let short = read_tail("only\n".as_bytes(), 5).await;
        assert_eq!(Vec::from(short), vec!["only"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_capture_reports_failed_exit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("fake-streamlink");
        std::fs::write(
            &script,
            "#!/bin/sh\ni=0; while [ $i -lt 2000 ]; do echo \"noise $i\" >&2; i=$((i+1)); done; exit 3\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let tool = StreamlinkCapture::new(CaptureConfig {
            streamlink_path: script,
            ..Default::default()
        });
        let exit = tool
            .capture(&name("alice"), &dir.path().join("out.mp4"))
            .await
            .unwrap();
        assert_eq!(
            exit,
            CaptureExit {
                success: false,
                code: Some(3)
            }
        );
    }
}
