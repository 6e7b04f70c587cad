//! Types returned by liveness probes.

use serde::{Deserialize, Serialize};

use crate::broadcaster::BroadcasterName;

/// Outcome class of a probe, as logged and reported in status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Online,
    Offline,
    Unauthorized,
    NotFound,
    Error,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::Error => "error",
        }
    }
}

/// One live broadcaster in a category listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStream {
    pub name: BroadcasterName,
    pub viewer_count: u64,
}

/// Snapshot of who is live, in platform order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveSet {
    streams: Vec<LiveStream>,
}

impl LiveSet {
    /// Build a live set, dropping repeated names (the platform can list a
    /// broadcaster twice while paginating).
    pub fn new(streams: Vec<LiveStream>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let streams = streams
            .into_iter()
            .filter(|s| seen.insert(s.name.clone()))
            .collect();
        Self { streams }
    }

    pub fn streams(&self) -> &[LiveStream] {
        &self.streams
    }

    pub fn names(&self) -> impl Iterator<Item = &BroadcasterName> {
        self.streams.iter().map(|s| &s.name)
    }

    /// Viewer counts, index-aligned with [`LiveSet::names`].
    pub fn viewer_counts(&self) -> Vec<u64> {
        self.streams.iter().map(|s| s.viewer_count).collect()
    }

    pub fn contains(&self, name: &BroadcasterName) -> bool {
        self.streams.iter().any(|s| &s.name == name)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

/// Details of a single live stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMetadata {
    pub name: BroadcasterName,
    /// Human-readable stream title (may be empty).
    pub title: String,
    #[serde(default)]
    pub viewer_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
}
