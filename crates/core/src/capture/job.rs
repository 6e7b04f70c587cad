//! Per-broadcaster capture lifecycle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::broadcaster::BroadcasterName;
use crate::config::Config;
use crate::dispatcher::{Job, JobFactory, JobOutcome};
use crate::metrics;
use crate::postprocess::{process_logged, repair_leftovers, PostProcessor};
use crate::prober::{LivenessProber, ProbeError, StreamMetadata};

use super::filename::build_filename;
use super::tool::CaptureTool;

/// Lifecycle status of a capture job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStatus {
    AwaitingLive,
    Recording,
    PostProcessing,
    Done,
    Failed,
}

impl CaptureStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// State owned by the worker running one job.
#[derive(Debug, Clone)]
pub struct CaptureState {
    pub status: CaptureStatus,
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    /// Live checks made so far.
    pub checks: u32,
}

impl CaptureState {
    fn new(raw_dir: PathBuf, processed_dir: PathBuf) -> Self {
        Self {
            status: CaptureStatus::AwaitingLive,
            raw_dir,
            processed_dir,
            checks: 0,
        }
    }

    fn advance(&mut self, broadcaster: &BroadcasterName, to: CaptureStatus) {
        debug!(broadcaster = %broadcaster, from = ?self.status, to = ?to, "Capture state change");
        self.status = to;
    }
}

/// Retry behaviour while waiting for a broadcaster to go live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait after an offline answer.
    pub offline_delay: Duration,
    /// Wait after a transient failure.
    pub error_delay: Duration,
    /// Give up after this many checks (None = never).
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            offline_delay: config.effective_poll_delay(),
            error_delay: config.error_cooldown(),
            max_attempts: config.recorder.max_check_attempts,
        }
    }
}

/// What to do with the answer to a live check.
#[derive(Debug)]
pub enum CheckDecision {
    /// Online: start recording with this metadata.
    Record(StreamMetadata),
    /// Check again after the delay.
    Wait(Duration),
    /// Refresh credentials, then check again.
    Refresh,
    /// Stop the job.
    Fail(String),
}

/// Decide the next step after check number `attempt` (1-based).
pub fn decide_check(
    result: Result<StreamMetadata, ProbeError>,
    policy: &RetryPolicy,
    attempt: u32,
) -> CheckDecision {
    let next = match result {
        Ok(metadata) => return CheckDecision::Record(metadata),
        Err(ProbeError::NotFound(what)) => {
            return CheckDecision::Fail(format!("broadcaster not found: {}", what))
        }
        Err(ProbeError::Offline) => CheckDecision::Wait(policy.offline_delay),
        Err(ProbeError::Unauthorized) => CheckDecision::Refresh,
        Err(_) => CheckDecision::Wait(policy.error_delay),
    };

    match policy.max_attempts {
        Some(max) if attempt >= max => {
            CheckDecision::Fail(format!("not live after {} checks", attempt))
        }
        _ => next,
    }
}

/// Where a broadcaster's raw and processed files go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self, broadcaster: &BroadcasterName) -> PathBuf {
        self.root.join("recorded").join(broadcaster.as_str())
    }

    pub fn processed_dir(&self, broadcaster: &BroadcasterName) -> PathBuf {
        self.root.join("processed").join(broadcaster.as_str())
    }
}

/// Collaborators shared by every capture job.
pub struct CaptureContext {
    pub prober: Arc<dyn LivenessProber>,
    pub tool: Arc<dyn CaptureTool>,
    pub post_processor: Arc<dyn PostProcessor>,
    pub layout: OutputLayout,
    pub retry: RetryPolicy,
    pub extension: String,
}

impl CaptureContext {
    pub fn from_config(
        config: &Config,
        prober: Arc<dyn LivenessProber>,
        tool: Arc<dyn CaptureTool>,
        post_processor: Arc<dyn PostProcessor>,
    ) -> Self {
        Self {
            prober,
            tool,
            post_processor,
            layout: OutputLayout::new(&config.recorder.root_path),
            retry: RetryPolicy::from_config(config),
            extension: config.capture.extension.clone(),
        }
    }
}

/// Creates [`CaptureJob`]s over a shared context.
#[derive(Clone)]
pub struct CaptureJobFactory {
    ctx: Arc<CaptureContext>,
}

impl CaptureJobFactory {
    pub fn new(ctx: CaptureContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }
}

impl JobFactory for CaptureJobFactory {
    fn create(&self, broadcaster: BroadcasterName) -> Box<dyn Job> {
        Box::new(CaptureJob::new(broadcaster, Arc::clone(&self.ctx)))
    }
}

/// Records one broadcaster's stream and post-processes the result.
pub struct CaptureJob {
    id: Uuid,
    broadcaster: BroadcasterName,
    ctx: Arc<CaptureContext>,
}

impl CaptureJob {
    pub fn new(broadcaster: BroadcasterName, ctx: Arc<CaptureContext>) -> Self {
        Self {
            id: Uuid::new_v4(),
            broadcaster,
            ctx,
        }
    }

    async fn prepare(&self, state: &CaptureState) {
        for dir in [&state.raw_dir, &state.processed_dir] {
            if let Err(e) = tokio::fs::create_dir_all(dir).await {
                warn!(broadcaster = %self.broadcaster, dir = %dir.display(), "Could not create directory: {}", e);
            }
        }

        match repair_leftovers(
            self.ctx.post_processor.as_ref(),
            &state.raw_dir,
            &state.processed_dir,
        )
        .await
        {
            Ok(summary) if summary.found > 0 => {
                info!(
                    broadcaster = %self.broadcaster,
                    processed = summary.processed,
                    failed = summary.failed,
                    "Leftover captures handled"
                );
            }
            Ok(_) => {}
            Err(e) => {
                warn!(broadcaster = %self.broadcaster, "Could not scan for leftover captures: {}", e);
            }
        }
    }

    async fn await_live(&self, state: &mut CaptureState) -> Result<StreamMetadata, String> {
        loop {
            state.checks += 1;
            let result = self.ctx.prober.check_one(&self.broadcaster).await;
            match &result {
                Ok(_) => {}
                Err(e) if e.is_transient() => {
                    warn!(broadcaster = %self.broadcaster, attempt = state.checks, "Live check failed: {}", e);
                }
                Err(e) => {
                    debug!(broadcaster = %self.broadcaster, status = e.status().as_str(), "Live check");
                }
            }

            match decide_check(result, &self.ctx.retry, state.checks) {
                CheckDecision::Record(metadata) => return Ok(metadata),
                CheckDecision::Wait(delay) => tokio::time::sleep(delay).await,
                CheckDecision::Refresh => {
                    if let Err(e) = self.ctx.prober.refresh_credentials().await {
                        warn!(broadcaster = %self.broadcaster, "Credential refresh failed: {}", e);
                        tokio::time::sleep(self.ctx.retry.error_delay).await;
                    }
                }
                CheckDecision::Fail(reason) => return Err(reason),
            }
        }
    }

    async fn record(&self, state: &mut CaptureState, metadata: &StreamMetadata) -> Option<PathBuf> {
        let filename = build_filename(
            Local::now(),
            self.broadcaster.as_str(),
            &metadata.title,
            &self.ctx.extension,
        );
        let raw = state.raw_dir.join(&filename);
        let processed = state.processed_dir.join(&filename);

        state.advance(&self.broadcaster, CaptureStatus::Recording);
        info!(
            broadcaster = %self.broadcaster,
            title = %metadata.title,
            file = %filename,
            "Recording started"
        );

        let started = Instant::now();
        let tool_failed = match self.ctx.tool.capture(&self.broadcaster, &raw).await {
            Ok(exit) => {
                info!(
                    broadcaster = %self.broadcaster,
                    success = exit.success,
                    code = ?exit.code,
                    elapsed_secs = started.elapsed().as_secs(),
                    "Recording ended"
                );
                false
            }
            Err(e) => {
                error!(broadcaster = %self.broadcaster, tool = self.ctx.tool.name(), "Capture failed: {}", e);
                true
            }
        };

        let produced = tokio::fs::try_exists(&raw).await.unwrap_or(false);
        let result = match (tool_failed, produced) {
            (true, _) => "error",
            (false, true) => "output",
            (false, false) => "no_output",
        };
        metrics::CAPTURE_DURATION
            .with_label_values(&[result])
            .observe(started.elapsed().as_secs_f64());

        if !produced {
            warn!(broadcaster = %self.broadcaster, raw = %raw.display(), "No capture file produced, skipping post-processing");
            return None;
        }

        state.advance(&self.broadcaster, CaptureStatus::PostProcessing);
        process_logged(self.ctx.post_processor.as_ref(), &raw, &processed)
            .await
            .map(|outcome| outcome.output_path)
    }
}

#[async_trait]
impl Job for CaptureJob {
    fn id(&self) -> Uuid {
        self.id
    }

    fn broadcaster(&self) -> &BroadcasterName {
        &self.broadcaster
    }

    async fn run(self: Box<Self>) -> JobOutcome {
        let mut state = CaptureState::new(
            self.ctx.layout.raw_dir(&self.broadcaster),
            self.ctx.layout.processed_dir(&self.broadcaster),
        );
        info!(broadcaster = %self.broadcaster, job_id = %self.id, "Capture job started");

        self.prepare(&state).await;

        let metadata = match self.await_live(&mut state).await {
            Ok(metadata) => metadata,
            Err(reason) => {
                state.advance(&self.broadcaster, CaptureStatus::Failed);
                error!(broadcaster = %self.broadcaster, job_id = %self.id, "Capture job failed: {}", reason);
                return JobOutcome::Failed { reason };
            }
        };

        let captured = self.record(&mut state, &metadata).await;
        state.advance(&self.broadcaster, CaptureStatus::Done);
        info!(broadcaster = %self.broadcaster, job_id = %self.id, "Capture job finished");
        JobOutcome::Done { captured }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockCaptureTool, MockPostProcessor, MockProber};
    use tempfile::TempDir;

    fn policy(max_attempts: Option<u32>) -> RetryPolicy {
        RetryPolicy {
            offline_delay: Duration::from_secs(45),
            error_delay: Duration::from_secs(300),
            max_attempts,
        }
    }

    fn context(
        root: &Path,
        prober: Arc<MockProber>,
        tool: Arc<MockCaptureTool>,
        post: Arc<MockPostProcessor>,
        max_attempts: Option<u32>,
    ) -> CaptureContext {
        CaptureContext {
            prober,
            tool,
            post_processor: post,
            layout: OutputLayout::new(root),
            retry: policy(max_attempts),
            extension: "mp4".to_string(),
        }
    }

    #[test]
    fn test_decide_check_branches() {
        let p = policy(None);
        let meta = fixtures::metadata("alice", "hello");

        assert!(matches!(decide_check(Ok(meta), &p, 1), CheckDecision::Record(_)));
        assert!(matches!(
            decide_check(Err(ProbeError::NotFound("alice".into())), &p, 1),
            CheckDecision::Fail(_)
        ));
        assert!(matches!(
            decide_check(Err(ProbeError::Offline), &p, 1),
            CheckDecision::Wait(d) if d == Duration::from_secs(45)
        ));
        assert!(matches!(
            decide_check(Err(ProbeError::Unavailable("503".into())), &p, 1),
            CheckDecision::Wait(d) if d == Duration::from_secs(300)
        ));
        assert!(matches!(
            decide_check(Err(ProbeError::Unauthorized), &p, 1),
            CheckDecision::Refresh
        ));
    }

    #[test]
    fn test_decide_check_attempt_cap() {
        let p = policy(Some(3));
        assert!(matches!(
            decide_check(Err(ProbeError::Offline), &p, 2),
            CheckDecision::Wait(_)
        ));
        assert!(matches!(
            decide_check(Err(ProbeError::Offline), &p, 3),
            CheckDecision::Fail(_)
        ));
        // Online still wins on the last attempt.
        assert!(matches!(
            decide_check(Ok(fixtures::metadata("a", "")), &p, 3),
            CheckDecision::Record(_)
        ));
    }

    #[test]
    fn test_layout() {
        let layout = OutputLayout::new("/data");
        let name = fixtures::name("alice");
        assert_eq!(layout.raw_dir(&name), PathBuf::from("/data/recorded/alice"));
        assert_eq!(layout.processed_dir(&name), PathBuf::from("/data/processed/alice"));
    }

    #[tokio::test]
    async fn test_job_records_and_post_processes() {
        let dir = TempDir::new().unwrap();
        let prober = Arc::new(MockProber::new());
        prober.push_check(Ok(fixtures::metadata("alice", "Speedrun: any% / \"glitchless\""))).await;
        let tool = Arc::new(MockCaptureTool::new());
        let post = Arc::new(MockPostProcessor::new());

        let factory = CaptureJobFactory::new(context(
            dir.path(),
            Arc::clone(&prober),
            Arc::clone(&tool),
            Arc::clone(&post),
            None,
        ));
        let job = factory.create(fixtures::name("alice"));
        assert_eq!(job.broadcaster().as_str(), "alice");

        let outcome = job.run().await;

        let captured = match outcome {
            JobOutcome::Done { captured: Some(path) } => path,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert!(captured.starts_with(dir.path().join("processed/alice")));
        let file_name = captured.file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.contains("alice - Speedrun any  glitchless.mp4"));
        assert!(!file_name.contains(['/', ':', '"']));
        assert_eq!(tool.captured().await.len(), 1);
        assert_eq!(post.processed().await.len(), 1);
        assert!(dir.path().join("recorded/alice").is_dir());
    }

    #[tokio::test]
    async fn test_job_without_output_skips_post_processing() {
        let dir = TempDir::new().unwrap();
        let prober = Arc::new(MockProber::new());
        prober.push_check(Ok(fixtures::metadata("alice", ""))).await;
        let tool = Arc::new(MockCaptureTool::without_output());
        let post = Arc::new(MockPostProcessor::new());

        let job = CaptureJob::new(
            fixtures::name("alice"),
            Arc::new(context(dir.path(), prober, tool, Arc::clone(&post), None)),
        );
        let outcome = Box::new(job).run().await;

        assert_eq!(outcome, JobOutcome::Done { captured: None });
        assert!(post.processed().await.is_empty());
    }

    #[tokio::test]
    async fn test_job_tool_error_counted_as_error() {
        let errors = || {
            metrics::CAPTURE_DURATION
                .with_label_values(&["error"])
                .get_sample_count()
        };
        let before = errors();

        let dir = TempDir::new().unwrap();
        let prober = Arc::new(MockProber::new());
        prober.push_check(Ok(fixtures::metadata("alice", ""))).await;
        let tool = Arc::new(MockCaptureTool::failing());
        let post = Arc::new(MockPostProcessor::new());

        let job = CaptureJob::new(
            fixtures::name("alice"),
            Arc::new(context(dir.path(), prober, Arc::clone(&tool), Arc::clone(&post), None)),
        );
        let outcome = Box::new(job).run().await;

        assert_eq!(outcome, JobOutcome::Done { captured: None });
        assert_eq!(tool.captured().await.len(), 1);
        assert!(post.processed().await.is_empty());
        assert!(errors() > before);
    }

    #[tokio::test]
    async fn test_job_not_found_fails_without_capture() {
        let dir = TempDir::new().unwrap();
        let prober = Arc::new(MockProber::new());
        prober.push_check(Err(ProbeError::NotFound("ghost".into()))).await;
        let tool = Arc::new(MockCaptureTool::new());
        let post = Arc::new(MockPostProcessor::new());

        let job = CaptureJob::new(
            fixtures::name("ghost"),
            Arc::new(context(dir.path(), prober, Arc::clone(&tool), post, None)),
        );
        let outcome = Box::new(job).run().await;

        assert!(matches!(outcome, JobOutcome::Failed { .. }));
        assert!(tool.captured().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_retries_until_live() {
        let dir = TempDir::new().unwrap();
        let prober = Arc::new(MockProber::new());
        prober.push_check(Err(ProbeError::Offline)).await;
        prober.push_check(Err(ProbeError::Unavailable("503".into()))).await;
        prober.push_check(Err(ProbeError::Unauthorized)).await;
        prober.push_check(Ok(fixtures::metadata("alice", "back"))).await;
        let tool = Arc::new(MockCaptureTool::new());
        let post = Arc::new(MockPostProcessor::new());

        let job = CaptureJob::new(
            fixtures::name("alice"),
            Arc::new(context(dir.path(), Arc::clone(&prober), Arc::clone(&tool), post, None)),
        );
        let started = tokio::time::Instant::now();
        let outcome = Box::new(job).run().await;

        assert!(outcome.is_done());
        assert_eq!(prober.check_calls(), 4);
        assert_eq!(prober.refresh_calls(), 1);
        // One offline wait plus one error cooldown.
        assert!(started.elapsed() >= Duration::from_secs(345));
        assert_eq!(tool.captured().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_gives_up_after_max_attempts() {
        let dir = TempDir::new().unwrap();
        let prober = Arc::new(MockProber::new());
        for _ in 0..5 {
            prober.push_check(Err(ProbeError::Offline)).await;
        }
        let tool = Arc::new(MockCaptureTool::new());
        let post = Arc::new(MockPostProcessor::new());

        let job = CaptureJob::new(
            fixtures::name("alice"),
            Arc::new(context(dir.path(), Arc::clone(&prober), Arc::clone(&tool), post, Some(2))),
        );
        let outcome = Box::new(job).run().await;

        assert_eq!(outcome, JobOutcome::failed("not live after 2 checks"));
        assert_eq!(prober.check_calls(), 2);
        assert!(tool.captured().await.is_empty());
    }

    #[tokio::test]
    async fn test_job_repairs_leftovers_first() {
        let dir = TempDir::new().unwrap();
        let raw_dir = dir.path().join("recorded/alice");
        std::fs::create_dir_all(&raw_dir).unwrap();
        std::fs::write(raw_dir.join("old.mp4"), b"stale").unwrap();

        let prober = Arc::new(MockProber::new());
        prober.push_check(Err(ProbeError::NotFound("alice".into()))).await;
        let post = Arc::new(MockPostProcessor::new());

        let job = CaptureJob::new(
            fixtures::name("alice"),
            Arc::new(context(
                dir.path(),
                prober,
                Arc::new(MockCaptureTool::new()),
                Arc::clone(&post),
                None,
            )),
        );
        Box::new(job).run().await;

        assert_eq!(post.processed().await, vec![raw_dir.join("old.mp4")]);
        assert!(dir.path().join("processed/alice/old.mp4").exists());
    }
}
