//! Configuration module for feedrelay.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::feed::ScheduleMode;
use crate::transform::{templates, BUILTIN_PROVIDERS};
use crate::{RelayError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Whether the web API is started.
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_server_enabled() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_server_enabled(),
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/feedrelay.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Empty disables file logging.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/feedrelay.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Feed fetcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Minimum delay between two requests to the same host, in milliseconds.
    #[serde(default = "default_min_delay")]
    pub min_delay_ms: u64,
    /// Upper bound of the randomized delay, in milliseconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Maximum number of attempts per fetch.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// Reject loopback, private and internal hosts.
    #[serde(default = "default_block_private_hosts")]
    pub block_private_hosts: bool,
}

fn default_min_delay() -> u64 {
    2000
}

fn default_max_delay() -> u64 {
    6000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_block_private_hosts() -> bool {
    true
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay(),
            max_delay_ms: default_max_delay(),
            max_attempts: default_max_attempts(),
            connect_timeout_secs: default_connect_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
            block_private_hosts: default_block_private_hosts(),
        }
    }
}

/// Background scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Whether periodic feeds are processed automatically.
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,
    /// How often to look for due feeds, in seconds.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// Maximum number of feeds processed at the same time.
    #[serde(default = "default_max_concurrent_feeds")]
    pub max_concurrent_feeds: usize,
}

fn default_scheduler_enabled() -> bool {
    true
}

fn default_check_interval() -> u64 {
    300 // 5 minutes
}

fn default_max_concurrent_feeds() -> usize {
    4
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            check_interval_secs: default_check_interval(),
            max_concurrent_feeds: default_max_concurrent_feeds(),
        }
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Total transform attempts per entry for network-class provider errors.
    #[serde(default = "default_transform_attempts")]
    pub transform_attempts: u32,
    /// Maximum number of new entries handled in one run.
    #[serde(default = "default_max_entries_per_run")]
    pub max_entries_per_run: usize,
}

fn default_transform_attempts() -> u32 {
    2
}

fn default_max_entries_per_run() -> usize {
    50
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            transform_attempts: default_transform_attempts(),
            max_entries_per_run: default_max_entries_per_run(),
        }
    }
}

/// Settings for one AI provider.
///
/// `base_url`, `model` and pricing fall back to the provider's own defaults
/// when absent.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProviderConfig {
    /// API key.
    #[serde(default)]
    pub api_key: String,
    /// API endpoint override.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model override.
    #[serde(default)]
    pub model: Option<String>,
    /// Maximum number of output tokens requested.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Request timeout in seconds.
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
    /// USD per million input tokens.
    #[serde(default)]
    pub input_cost_per_mtok: Option<f64>,
    /// USD per million output tokens.
    #[serde(default)]
    pub output_cost_per_mtok: Option<f64>,
}

fn default_max_output_tokens() -> u32 {
    2048
}

fn default_provider_timeout() -> u64 {
    60
}

/// AI provider configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProvidersConfig {
    /// OpenAI-compatible chat completions provider.
    #[serde(default)]
    pub openai: ProviderConfig,
    /// Anthropic messages provider.
    #[serde(default)]
    pub anthropic: ProviderConfig,
}

/// Target CMS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CmsConfig {
    /// Base URL of the CMS API (posts are created at `{base_url}/posts`).
    #[serde(default)]
    pub base_url: String,
    /// Bearer token.
    #[serde(default)]
    pub api_token: String,
    /// Request timeout in seconds.
    #[serde(default = "default_cms_timeout")]
    pub timeout_secs: u64,
}

fn default_cms_timeout() -> u64 {
    30
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_token: String::new(),
            timeout_secs: default_cms_timeout(),
        }
    }
}

/// Legacy passthrough endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyConfig {
    /// Whether `/proxy` is served.
    #[serde(default = "default_legacy_enabled")]
    pub enabled: bool,
    /// The fixed upstream URL returned by `/proxy`.
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,
    /// User agent sent upstream.
    #[serde(default = "default_proxy_user_agent")]
    pub user_agent: String,
}

fn default_legacy_enabled() -> bool {
    true
}

fn default_proxy_url() -> String {
    "https://natesnewsletter.substack.com/feed".to_string()
}

fn default_proxy_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            enabled: default_legacy_enabled(),
            proxy_url: default_proxy_url(),
            user_agent: default_proxy_user_agent(),
        }
    }
}

/// A feed declared in the configuration file.
///
/// Declared feeds are synced into the feed store at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedDefinition {
    /// Unique feed name.
    pub name: String,
    /// Source URL.
    pub url: String,
    /// AI provider key.
    #[serde(default = "default_feed_provider")]
    pub provider: String,
    /// Prompt template name.
    #[serde(default = "default_feed_template")]
    pub template: String,
    /// Schedule mode.
    #[serde(default)]
    pub schedule: ScheduleMode,
    /// Interval for periodic feeds, in seconds.
    #[serde(default = "default_feed_interval")]
    pub interval_secs: i64,
    /// Whether the feed is enabled.
    #[serde(default = "default_feed_enabled")]
    pub enabled: bool,
}

fn default_feed_provider() -> String {
    "openai".to_string()
}

fn default_feed_template() -> String {
    "blog_post".to_string()
}

fn default_feed_interval() -> i64 {
    3600 // 1 hour
}

fn default_feed_enabled() -> bool {
    true
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Fetcher configuration.
    #[serde(default)]
    pub fetcher: FetcherConfig,
    /// Scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Orchestrator configuration.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// AI providers.
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Target CMS.
    #[serde(default)]
    pub cms: CmsConfig,
    /// Legacy passthrough endpoint.
    #[serde(default)]
    pub legacy: LegacyConfig,
    /// Feeds declared in the file.
    #[serde(default)]
    pub feeds: Vec<FeedDefinition>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(RelayError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RelayError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FEEDRELAY_OPENAI_API_KEY`
    /// - `FEEDRELAY_ANTHROPIC_API_KEY`
    /// - `FEEDRELAY_CMS_TOKEN`
    pub fn apply_env_overrides(&mut self) {
        if let Some(key) = non_empty_env("FEEDRELAY_OPENAI_API_KEY") {
            self.providers.openai.api_key = key;
        }
        if let Some(key) = non_empty_env("FEEDRELAY_ANTHROPIC_API_KEY") {
            self.providers.anthropic.api_key = key;
        }
        if let Some(token) = non_empty_env("FEEDRELAY_CMS_TOKEN") {
            self.cms.api_token = token;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.min_delay_ms > self.fetcher.max_delay_ms {
            return Err(RelayError::Validation(format!(
                "fetcher.min_delay_ms ({}) is greater than fetcher.max_delay_ms ({})",
                self.fetcher.min_delay_ms, self.fetcher.max_delay_ms
            )));
        }
        if self.fetcher.max_attempts == 0 {
            return Err(RelayError::Validation(
                "fetcher.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.pipeline.transform_attempts == 0 {
            return Err(RelayError::Validation(
                "pipeline.transform_attempts must be at least 1".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for feed in &self.feeds {
            if !names.insert(feed.name.as_str()) {
                return Err(RelayError::Validation(format!(
                    "duplicate feed name: {}",
                    feed.name
                )));
            }
            if !BUILTIN_PROVIDERS.contains(&feed.provider.as_str()) {
                return Err(RelayError::Validation(format!(
                    "feed {} uses unknown provider: {}",
                    feed.name, feed.provider
                )));
            }
            if templates::find(&feed.template).is_none() {
                return Err(RelayError::Validation(format!(
                    "feed {} uses unknown template: {}",
                    feed.name, feed.template
                )));
            }
            if feed.schedule == ScheduleMode::Periodic && feed.interval_secs <= 0 {
                return Err(RelayError::Validation(format!(
                    "feed {} is periodic but interval_secs is {}",
                    feed.name, feed.interval_secs
                )));
            }
        }

        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
