//! Testing utilities and mock implementations.
//!
//! Mocks for every collaborator trait, so reconcile cycles and capture jobs
//! can run without the platform API, streamlink or ffmpeg.
//!
//! # Example
//!
//! ```rust,ignore
//! use castkeeper_core::testing::{fixtures, MockProber, MemoryWhitelistStore};
//!
//! let prober = MockProber::new();
//! prober.set_live(fixtures::live_set(&[("alice", 120)])).await;
//! let store = MemoryWhitelistStore::with_entries(&[("alice", "x")]);
//! ```

mod memory_store;
mod mock_capture;
mod mock_jobs;
mod mock_postprocess;
mod mock_prober;

pub use memory_store::{MemoryHistoryLog, MemoryWhitelistStore};
pub use mock_capture::{MockCaptureTool, RecordedCapture};
pub use mock_jobs::MockJobFactory;
pub use mock_postprocess::MockPostProcessor;
pub use mock_prober::MockProber;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::broadcaster::BroadcasterName;
    use crate::prober::{LiveSet, LiveStream, StreamMetadata};
    use crate::whitelist::Whitelist;

    /// Panics on an unusable name.
    pub fn name(raw: &str) -> BroadcasterName {
        BroadcasterName::new(raw).expect("fixture name must be valid")
    }

    pub fn names(raw: &[&str]) -> Vec<BroadcasterName> {
        raw.iter().map(|n| name(n)).collect()
    }

    /// Live set from `(name, viewers)` pairs, in the given order.
    pub fn live_set(streams: &[(&str, u64)]) -> LiveSet {
        LiveSet::new(
            streams
                .iter()
                .map(|(n, viewers)| LiveStream {
                    name: name(n),
                    viewer_count: *viewers,
                })
                .collect(),
        )
    }

    /// Whitelist from `(name, annotation)` pairs.
    pub fn whitelist(entries: &[(&str, &str)]) -> Whitelist {
        entries
            .iter()
            .map(|(n, annotation)| (name(n), annotation.to_string()))
            .collect()
    }

    /// Metadata of an online stream.
    pub fn metadata(broadcaster: &str, title: &str) -> StreamMetadata {
        StreamMetadata {
            name: name(broadcaster),
            title: title.to_string(),
            viewer_count: 42,
            category: Some("Just Chatting".to_string()),
            started_at: Some("2024-05-01T18:00:00Z".to_string()),
        }
    }
}
