use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Lowest poll delay accepted before it is clamped.
pub const MIN_POLL_DELAY_SECS: u64 = 15;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub twitch: TwitchConfig,
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub postprocess: PostProcessConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Poll delay with the lower bound applied.
    pub fn effective_poll_delay(&self) -> Duration {
        clamp_poll_delay(self.recorder.poll_delay_secs)
    }

    /// Cooldown applied after a poll or status check fails.
    pub fn error_cooldown(&self) -> Duration {
        Duration::from_secs(self.recorder.error_cooldown_secs)
    }
}

/// Clamp a poll delay (seconds) to the allowed minimum.
///
/// Silent; [`normalize_config`](super::normalize_config) warns once when the
/// configured value is raised.
pub fn clamp_poll_delay(secs: u64) -> Duration {
    Duration::from_secs(secs.max(MIN_POLL_DELAY_SECS))
}

/// Streaming platform API credentials and endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TwitchConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Request timeout in seconds (default: 15)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Streams requested per page of the live listing (max 100)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Maximum pages followed per live listing
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_api_url() -> String {
    "https://api.twitch.tv/helix".to_string()
}

fn default_token_url() -> String {
    "https://id.twitch.tv/oauth2/token".to_string()
}

fn default_timeout() -> u64 {
    15
}

fn default_page_size() -> u32 {
    100
}

fn default_max_pages() -> u32 {
    1
}

/// Discovery and dispatch configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecorderConfig {
    /// Category (game) name to watch.
    pub category: String,
    /// Stream language code.
    #[serde(default = "default_language")]
    pub language: String,
    /// Root for the `recorded/` and `processed/` trees.
    #[serde(default = "default_root_path")]
    pub root_path: PathBuf,
    #[serde(default = "default_whitelist_path")]
    pub whitelist_path: PathBuf,
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
    #[serde(default = "default_poll_delay")]
    pub poll_delay_secs: u64,
    #[serde(default = "default_error_cooldown")]
    pub error_cooldown_secs: u64,
    /// Capture worker slots (0 = available parallelism).
    #[serde(default)]
    pub max_workers: usize,
    /// Status checks a capture job makes before giving up (unset = unbounded).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_check_attempts: Option<u32>,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_root_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_whitelist_path() -> PathBuf {
    PathBuf::from("streamers.csv")
}

fn default_history_path() -> PathBuf {
    PathBuf::from("historique.csv")
}

fn default_poll_delay() -> u64 {
    45
}

fn default_error_cooldown() -> u64 {
    300
}

/// External capture tool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    #[serde(default = "default_streamlink_path")]
    pub streamlink_path: PathBuf,
    #[serde(default = "default_quality")]
    pub quality: String,
    #[serde(default = "default_quality_exclusion")]
    pub quality_exclusion: String,
    #[serde(default = "default_true")]
    pub disable_ads: bool,
    /// Extension of the captured files.
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            streamlink_path: default_streamlink_path(),
            quality: default_quality(),
            quality_exclusion: default_quality_exclusion(),
            disable_ads: true,
            extension: default_extension(),
        }
    }
}

fn default_streamlink_path() -> PathBuf {
    PathBuf::from("streamlink")
}

fn default_quality() -> String {
    "high,best".to_string()
}

fn default_quality_exclusion() -> String {
    ">720p30".to_string()
}

fn default_true() -> bool {
    true
}

fn default_extension() -> String {
    "mp4".to_string()
}

/// How finished captures reach the processed directory
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PostProcessMode {
    /// Remux through ffmpeg, ignoring decode errors.
    #[default]
    Repair,
    /// Plain move, no repair.
    Move,
}

/// Post-processing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostProcessConfig {
    #[serde(default)]
    pub mode: PostProcessMode,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
    /// FFmpeg `-loglevel` value.
    #[serde(default = "default_ffmpeg_log_level")]
    pub log_level: String,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            mode: PostProcessMode::default(),
            ffmpeg_path: default_ffmpeg_path(),
            log_level: default_ffmpeg_log_level(),
        }
    }
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffmpeg_log_level() -> String {
    "error".to_string()
}

/// Status API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    8787
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub twitch: SanitizedTwitchConfig,
    pub recorder: RecorderConfig,
    pub capture: CaptureConfig,
    pub postprocess: PostProcessConfig,
    pub server: ServerConfig,
}

/// Twitch config with the client secret hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTwitchConfig {
    pub client_id: String,
    pub client_secret_configured: bool,
    pub api_url: String,
    pub token_url: String,
    pub timeout_secs: u64,
    pub page_size: u32,
    pub max_pages: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            twitch: SanitizedTwitchConfig {
                client_id: config.twitch.client_id.clone(),
                client_secret_configured: !config.twitch.client_secret.is_empty(),
                api_url: config.twitch.api_url.clone(),
                token_url: config.twitch.token_url.clone(),
                timeout_secs: config.twitch.timeout_secs,
                page_size: config.twitch.page_size,
                max_pages: config.twitch.max_pages,
            },
            recorder: config.recorder.clone(),
            capture: config.capture.clone(),
            postprocess: config.postprocess.clone(),
            server: config.server.clone(),
        }
    }
}
