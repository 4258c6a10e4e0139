//! Configuration and settings management
//!
//! Loads relay settings from config files and environment variables and
//! defines the transport constants the pipeline relies on.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Maximum number of items Telegram accepts in a single media group.
pub const MEDIA_GROUP_LIMIT: usize = 10;
/// Maximum caption length accepted by Telegram (characters).
pub const CAPTION_LIMIT: usize = 1024;
/// Maximum number of characters of downloader stderr kept in errors.
pub const STDERR_EXCERPT_LIMIT: usize = 2000;
/// Interval between "working" indicator refreshes while a fetch runs.
pub const WORKING_INDICATOR_INTERVAL_SECS: u64 = 4;

/// Maximum retry attempts for Telegram API operations.
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Initial backoff delay for Telegram API retries (milliseconds).
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff delay for Telegram API retries (milliseconds).
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_ITEMS: usize = 30;
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// How the user is told that a link is being processed.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AckMode {
    /// No acknowledgement at all.
    None,
    /// A periodically refreshed chat action ("sending a file...").
    #[default]
    Action,
    /// A transient text message removed once the fetch finishes.
    Placeholder,
}

/// Relay pipeline settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelaySettings {
    /// Downloader executable name or path
    #[serde(default = "default_downloader_bin")]
    pub downloader_bin: String,
    /// Optional downloader configuration file passed via `--config`
    pub downloader_config: Option<String>,
    /// Parent directory for per-fetch scratch directories
    pub scratch_root: Option<PathBuf>,
    /// Upper bound on a single downloader run (seconds)
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Maximum number of media files delivered for one link
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Files larger than this are not uploaded
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Comma-separated list of additional tracking query keys
    #[serde(rename = "extra_tracking_params")]
    pub extra_tracking_params_str: Option<String>,
    /// Acknowledgement shown while fetching
    #[serde(default)]
    pub ack_mode: AckMode,
    /// Also delete the source message in group chats
    #[serde(default)]
    pub delete_in_groups: bool,
    /// Send non-photo/video files one by one instead of dropping them
    #[serde(default)]
    pub send_documents_individually: bool,
    /// Tell the user when a link could not be fetched
    #[serde(default)]
    pub notify_fetch_failures: bool,
}

fn default_downloader_bin() -> String {
    "gallery-dl".to_string()
}

const fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

const fn default_max_items() -> usize {
    DEFAULT_MAX_ITEMS
}

const fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            downloader_bin: default_downloader_bin(),
            downloader_config: None,
            scratch_root: None,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            max_items: DEFAULT_MAX_ITEMS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            extra_tracking_params_str: None,
            ack_mode: AckMode::default(),
            delete_in_groups: false,
            send_documents_individually: false,
            notify_fetch_failures: false,
        }
    }
}

/// Build the layered configuration shared by every settings struct.
///
/// Sources, lowest priority first: `config/default`, `config/{RUN_MODE}`,
/// `config/local`, `APP__*` variables, plain environment variables.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be read.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // UPPER_SNAKE_CASE variables map onto snake_case keys; empty values count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl RelaySettings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use oxide_relay_core::config::RelaySettings;
    ///
    /// let settings = RelaySettings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Timeout applied to a single downloader run
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Parent directory for scratch directories
    #[must_use]
    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_root.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Additional tracking keys configured by the operator (lowercased)
    #[must_use]
    pub fn extra_tracking_params(&self) -> HashSet<String> {
        self.extra_tracking_params_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .map(str::to_ascii_lowercase)
                    .collect()
            })
            .unwrap_or_default()
    }
}
