//! Reconciler configuration.

use std::time::Duration;

use crate::config::{clamp_poll_delay, Config};

/// Settings for the poll loop, resolved at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Platform id of the watched category.
    pub category_id: String,
    pub language: String,
    /// Delay between cycles, already clamped.
    pub poll_delay: Duration,
    /// Delay after a cycle whose listing failed transiently.
    pub error_cooldown: Duration,
}

impl ReconcilerConfig {
    pub fn new(
        category_id: impl Into<String>,
        language: impl Into<String>,
        poll_delay_secs: u64,
        error_cooldown_secs: u64,
    ) -> Self {
        Self {
            category_id: category_id.into(),
            language: language.into(),
            poll_delay: clamp_poll_delay(poll_delay_secs),
            error_cooldown: Duration::from_secs(error_cooldown_secs),
        }
    }

    pub fn from_config(config: &Config, category_id: impl Into<String>) -> Self {
        Self {
            category_id: category_id.into(),
            language: config.recorder.language.clone(),
            poll_delay: config.effective_poll_delay(),
            error_cooldown: config.error_cooldown(),
        }
    }
}
