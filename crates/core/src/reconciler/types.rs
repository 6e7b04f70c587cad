//! Types for the reconciler.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::broadcaster::BroadcasterName;
use crate::dispatcher::PoolStatus;
use crate::prober::{LiveStream, ProbeStatus};

/// What one poll cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// 1-based cycle number.
    pub cycle: u64,
    /// Outcome of the live listing.
    pub result: ProbeStatus,
    /// Size of the live set used by this cycle.
    pub live: usize,
    /// Broadcasters whose completion was drained.
    pub drained: Vec<BroadcasterName>,
    /// Broadcasters a job was dispatched for, sorted.
    pub started: Vec<BroadcasterName>,
    /// Sleep before the next cycle.
    pub next_delay: Duration,
}

/// Snapshot published after every cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcilerStatus {
    /// Whether the poll loop is running.
    pub running: bool,
    pub cycles: u64,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub last_result: Option<ProbeStatus>,
    /// Live set with viewer counts, in platform order.
    pub live: Vec<LiveStream>,
    /// Broadcasters with a job in flight, sorted.
    pub recording: Vec<BroadcasterName>,
    pub whitelist_entries: usize,
    pub whitelist_enabled: usize,
    pub pool: PoolStatus,
}
