//! Capture jobs: wait for a broadcaster to go live, record, post-process.

mod error;
mod filename;
mod job;
mod tool;

pub use error::CaptureError;
pub use filename::{build_filename, sanitize_filename, FILENAME_TIME_FORMAT, MAX_FILENAME_BYTES};
pub use job::{
    decide_check, CaptureContext, CaptureJob, CaptureJobFactory, CaptureState, CaptureStatus,
    CheckDecision, OutputLayout, RetryPolicy,
};
pub use tool::{CaptureExit, CaptureTool, StreamlinkCapture};
