//! Types shared by the dispatcher and its jobs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::broadcaster::BroadcasterName;
use std::path::PathBuf;

/// Errors returned when submitting work.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The dispatcher no longer accepts jobs.
    #[error("dispatcher is closed")]
    Closed,
}

/// Terminal result of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The job ran to the end. `captured` is the processed file, if any.
    Done { captured: Option<PathBuf> },
    /// The job gave up.
    Failed { reason: String },
}

impl JobOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Done { .. } => "done",
            Self::Failed { .. } => "failed",
        }
    }
}

/// A unit of work for one broadcaster.
#[async_trait]
pub trait Job: Send + 'static {
    fn id(&self) -> Uuid;

    fn broadcaster(&self) -> &BroadcasterName;

    /// Run to completion. Consumes the job.
    async fn run(self: Box<Self>) -> JobOutcome;
}

/// Builds the job dispatched for a broadcaster.
pub trait JobFactory: Send + Sync {
    fn create(&self, broadcaster: BroadcasterName) -> Box<dyn Job>;
}

/// Record pushed to the completion queue when a job returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub broadcaster: BroadcasterName,
    pub job_id: Uuid,
    pub outcome: JobOutcome,
    pub finished_at: DateTime<Utc>,
}

/// Snapshot of the worker pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Maximum jobs running at once.
    pub capacity: usize,
    /// Jobs holding a worker slot.
    pub busy: usize,
    /// Submitted jobs that have not completed yet (running or waiting).
    pub in_flight: usize,
}
