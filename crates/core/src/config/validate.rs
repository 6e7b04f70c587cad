use tracing::warn;

use super::language::resolve_language;
use super::types::{Config, MIN_POLL_DELAY_SECS};
use super::ConfigError;

/// Rewrite settings into the form the rest of the program uses.
///
/// The language becomes its ISO 639-1 code and a poll delay under
/// [`MIN_POLL_DELAY_SECS`] is raised to it, with a warning. Unknown
/// languages are rejected. Run after CLI overrides, before
/// [`validate_config`].
pub fn normalize_config(config: &mut Config) -> Result<(), ConfigError> {
    config.recorder.language = resolve_language(&config.recorder.language)?;

    if config.recorder.poll_delay_secs < MIN_POLL_DELAY_SECS {
        warn!(
            configured = config.recorder.poll_delay_secs,
            minimum = MIN_POLL_DELAY_SECS,
            "Poll delay should not be lower than {} seconds, clamping",
            MIN_POLL_DELAY_SECS
        );
        config.recorder.poll_delay_secs = MIN_POLL_DELAY_SECS;
    }
    Ok(())
}

/// Validate configuration
/// Currently validates:
/// - Twitch credentials are present
/// - Category is not blank and the language is known
/// - Listing page size is within the platform limit (1..=100)
/// - Capture quality and file extension are usable
/// - Server port is not 0 when the status API is enabled
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.twitch.client_id.trim().is_empty() {
        return Err(invalid("twitch.client_id cannot be empty"));
    }
    if config.twitch.client_secret.trim().is_empty() {
        return Err(invalid("twitch.client_secret cannot be empty"));
    }
    if !(1..=100).contains(&config.twitch.page_size) {
        return Err(invalid("twitch.page_size must be between 1 and 100"));
    }
    if config.twitch.max_pages == 0 {
        return Err(invalid("twitch.max_pages must be at least 1"));
    }

    if config.recorder.category.trim().is_empty() {
        return Err(invalid("recorder.category cannot be empty"));
    }
    resolve_language(&config.recorder.language)?;
    if config.recorder.max_check_attempts == Some(0) {
        return Err(invalid("recorder.max_check_attempts must be at least 1"));
    }

    if config.capture.quality.trim().is_empty() {
        return Err(invalid("capture.quality cannot be empty"));
    }
    let ext = &config.capture.extension;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid("capture.extension must be alphanumeric"));
    }

    if config.server.enabled && config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    Ok(())
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::ValidationError(msg.to_string())
}
