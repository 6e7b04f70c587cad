//! Core library for castkeeper: discovers whitelisted broadcasters who go
//! live in a category and keeps one capture job running for each.

pub mod broadcaster;
pub mod capture;
pub mod config;
pub mod dispatcher;
pub mod metrics;
pub mod postprocess;
pub mod prober;
pub mod reconciler;
pub mod testing;
pub mod whitelist;

pub use broadcaster::{BroadcasterName, InvalidName};
pub use capture::{
    CaptureContext, CaptureError, CaptureJob, CaptureJobFactory, CaptureStatus, CaptureTool,
    OutputLayout, RetryPolicy, StreamlinkCapture,
};
pub use config::{
    load_config, load_config_from_str, normalize_config, resolve_language, validate_config, Config,
    ConfigError, PostProcessMode, SanitizedConfig,
};
pub use dispatcher::{
    Completion, CompletionQueue, DispatchError, Dispatcher, Job, JobFactory, JobOutcome,
    PoolStatus,
};
pub use postprocess::{
    create_post_processor, FfmpegRepairer, MoveProcessor, PostProcessError, PostProcessor,
};
pub use prober::{HelixClient, LiveSet, LiveStream, LivenessProber, ProbeError, ProbeStatus};
pub use reconciler::{CycleReport, Reconciler, ReconcilerConfig, ReconcilerStatus};
pub use whitelist::{CsvWhitelistStore, FileHistoryLog, HistoryLog, Whitelist, WhitelistStore};
