//! Liveness probing against the streaming platform.
//!
//! Every call returns a tagged result: `Ok` carries the payload for an online
//! answer, and each non-online outcome (offline, unauthorized, not found,
//! transient failure) is its own [`ProbeError`] variant.

mod helix;
mod types;

pub use helix::HelixClient;
pub use types::{LiveSet, LiveStream, ProbeStatus, StreamMetadata};

use async_trait::async_trait;
use thiserror::Error;

use crate::broadcaster::BroadcasterName;

/// Non-online outcomes of a probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Nothing is live for the query.
    #[error("offline")]
    Offline,

    /// Credentials were rejected; refresh and retry.
    #[error("unauthorized")]
    Unauthorized,

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The platform answered with an unexpected status or body.
    #[error("platform unavailable: {0}")]
    Unavailable(String),

    /// The request did not complete.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProbeError {
    /// Status reported for this outcome.
    pub fn status(&self) -> ProbeStatus {
        match self {
            Self::Offline => ProbeStatus::Offline,
            Self::Unauthorized => ProbeStatus::Unauthorized,
            Self::NotFound(_) => ProbeStatus::NotFound,
            Self::Unavailable(_) | Self::Http(_) => ProbeStatus::Error,
        }
    }

    /// Whether the caller should back off and try again later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Http(_))
    }
}

/// Queries the platform for who is live.
#[async_trait]
pub trait LivenessProber: Send + Sync {
    /// Returns the name of this prober implementation.
    fn name(&self) -> &str;

    /// Look up the platform id of a category by its display name.
    async fn resolve_category_id(&self, category: &str) -> Result<String, ProbeError>;

    /// Broadcasters currently live in a category and language.
    ///
    /// An empty listing is reported as [`ProbeError::Offline`], never as an
    /// empty `Ok`.
    async fn list_live(&self, category_id: &str, language: &str) -> Result<LiveSet, ProbeError>;

    /// Live status and stream metadata of a single broadcaster.
    async fn check_one(&self, name: &BroadcasterName) -> Result<StreamMetadata, ProbeError>;

    /// Exchange client credentials for a fresh access token.
    async fn refresh_credentials(&self) -> Result<(), ProbeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ProbeError::Offline.status(), ProbeStatus::Offline);
        assert_eq!(ProbeError::Unauthorized.status(), ProbeStatus::Unauthorized);
        assert_eq!(
            ProbeError::NotFound("x".to_string()).status(),
            ProbeStatus::NotFound
        );
        assert_eq!(
            ProbeError::Unavailable("503".to_string()).status(),
            ProbeStatus::Error
        );
    }

    #[test]
    fn test_transient() {
        assert!(ProbeError::Unavailable("boom".to_string()).is_transient());
        assert!(!ProbeError::Offline.is_transient());
        assert!(!ProbeError::Unauthorized.is_transient());
        assert!(!ProbeError::NotFound("x".to_string()).is_transient());
    }
}
