use chrono::{DateTime, Utc};
use tokio::sync::watch;

use castkeeper_core::{Config, ReconcilerStatus, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    config_hash: String,
    started_at: DateTime<Utc>,
    status: watch::Receiver<ReconcilerStatus>,
}

impl AppState {
    pub fn new(
        config: Config,
        config_hash: String,
        status: watch::Receiver<ReconcilerStatus>,
    ) -> Self {
        Self {
            config,
            config_hash,
            started_at: Utc::now(),
            status,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Latest status published by the reconciler.
    pub fn status(&self) -> ReconcilerStatus {
        self.status.borrow().clone()
    }
}
