//! Configuration management for nuri
//!
//! This module handles loading and validating configuration from environment variables,
//! TOML files, and command-line arguments.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::retry::RetryConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Pipeline overview configuration
    pub pipeline: PipelineConfig,

    /// Duplicate screening configuration
    pub dedup: DedupConfig,

    /// Publish dispatcher configuration
    pub dispatcher: DispatcherConfig,

    /// Platform credentials
    pub platforms: PlatformsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,

    /// How long a writer waits on a locked database, in milliseconds
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/nuri.db"),
            busy_timeout_ms: 5000,
        }
    }
}

/// Bottleneck thresholds for the pipeline overview
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Warn when more than this many items sit in DRAFT
    pub draft_threshold: u64,

    /// Warn when more than this many items sit in REVIEW
    pub review_threshold: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            draft_threshold: 10,
            review_threshold: 5,
        }
    }
}

/// Duplicate screening configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Number of most recent contents compared per check
    pub candidate_limit: usize,

    /// Minimum combined score for a candidate to be reported
    pub near_threshold: f64,

    /// Minimum top score for a check to be flagged as duplicate
    pub strict_threshold: f64,

    /// Maximum number of similar items reported
    pub max_similar: usize,

    /// Reject flagged submissions instead of creating them with the duplicate flag
    pub block_duplicates: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            candidate_limit: 100,
            near_threshold: 0.7,
            strict_threshold: 0.9,
            max_similar: 5,
            block_duplicates: false,
        }
    }
}

/// Publish dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Failures allowed before a job is marked FAILED
    pub max_retries: u32,

    /// First backoff delay in seconds
    pub base_delay_secs: u64,

    /// Upper bound for backoff delay in seconds
    pub max_delay_secs: u64,

    /// Interval between due-job sweeps in seconds
    pub sweep_interval_secs: u64,

    /// Timeout for a single platform call in seconds
    pub platform_timeout_secs: u64,

    /// Age after which a dispatch claim is considered abandoned, in seconds
    pub claim_timeout_secs: u64,

    /// Outbound requests per second, per platform
    pub requests_per_second: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 60,
            max_delay_secs: 3600,
            sweep_interval_secs: 30,
            platform_timeout_secs: 30,
            claim_timeout_secs: 600,
            requests_per_second: 2,
        }
    }
}

impl DispatcherConfig {
    /// Backoff policy for failed jobs
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::with_delays(
            self.max_retries,
            self.base_delay_secs.saturating_mul(1000),
            self.max_delay_secs.saturating_mul(1000),
        )
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    #[must_use]
    pub fn platform_timeout(&self) -> Duration {
        Duration::from_secs(self.platform_timeout_secs)
    }

    #[must_use]
    pub fn claim_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.claim_timeout_secs.min(i64::MAX as u64) as i64)
    }
}

/// Credentials for every supported platform
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformsConfig {
    pub tistory: TistoryConfig,
    pub wordpress: WordpressConfig,
}

/// Tistory Open API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TistoryConfig {
    pub access_token: Option<String>,
    pub blog_name: Option<String>,
    /// 0 private, 1 protected, 3 public
    pub visibility: u8,
    pub base_url: String,
}

impl Default for TistoryConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            blog_name: None,
            visibility: 3,
            base_url: String::from("https://www.tistory.com"),
        }
    }
}

impl TistoryConfig {
    pub fn is_configured(&self) -> bool {
        has_value(&self.access_token) && has_value(&self.blog_name)
    }
}

/// WordPress REST API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WordpressConfig {
    pub site_url: Option<String>,
    pub username: Option<String>,
    pub app_password: Option<String>,
    /// `publish`, `draft`, `pending` or `private`
    pub post_status: String,
}

impl Default for WordpressConfig {
    fn default() -> Self {
        Self {
            site_url: None,
            username: None,
            app_password: None,
            post_status: String::from("publish"),
        }
    }
}

impl WordpressConfig {
    pub fn is_configured(&self) -> bool {
        has_value(&self.site_url)
    }
}

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables fall back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let sqlite_path = env_string("NURI_SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database.sqlite_path);

        let busy_timeout_ms =
            env_parse("NURI_BUSY_TIMEOUT_MS").unwrap_or(defaults.database.busy_timeout_ms);

        let draft_threshold =
            env_parse("NURI_DRAFT_THRESHOLD").unwrap_or(defaults.pipeline.draft_threshold);
        let review_threshold =
            env_parse("NURI_REVIEW_THRESHOLD").unwrap_or(defaults.pipeline.review_threshold);

        let dedup = DedupConfig {
            candidate_limit: env_parse("NURI_DEDUP_CANDIDATE_LIMIT")
                .unwrap_or(defaults.dedup.candidate_limit),
            near_threshold: env_parse("NURI_DEDUP_NEAR_THRESHOLD")
                .unwrap_or(defaults.dedup.near_threshold),
            strict_threshold: env_parse("NURI_DEDUP_STRICT_THRESHOLD")
                .unwrap_or(defaults.dedup.strict_threshold),
            max_similar: env_parse("NURI_DEDUP_MAX_SIMILAR").unwrap_or(defaults.dedup.max_similar),
            block_duplicates: env_parse("NURI_DEDUP_BLOCK").unwrap_or(defaults.dedup.block_duplicates),
        };

        let d = &defaults.dispatcher;
        let dispatcher = DispatcherConfig {
            max_retries: env_parse("NURI_MAX_RETRIES").unwrap_or(d.max_retries),
            base_delay_secs: env_parse("NURI_BASE_DELAY_SECS").unwrap_or(d.base_delay_secs),
            max_delay_secs: env_parse("NURI_MAX_DELAY_SECS").unwrap_or(d.max_delay_secs),
            sweep_interval_secs: env_parse("NURI_SWEEP_INTERVAL_SECS")
                .unwrap_or(d.sweep_interval_secs),
            platform_timeout_secs: env_parse("NURI_PLATFORM_TIMEOUT_SECS")
                .unwrap_or(d.platform_timeout_secs),
            claim_timeout_secs: env_parse("NURI_CLAIM_TIMEOUT_SECS").unwrap_or(d.claim_timeout_secs),
            requests_per_second: env_parse("NURI_REQUESTS_PER_SECOND")
                .unwrap_or(d.requests_per_second),
        };

        let tistory = TistoryConfig {
            access_token: env_string("TISTORY_ACCESS_TOKEN"),
            blog_name: env_string("TISTORY_BLOG_NAME"),
            visibility: env_parse("TISTORY_VISIBILITY")
                .unwrap_or(defaults.platforms.tistory.visibility),
            base_url: env_string("TISTORY_BASE_URL")
                .unwrap_or(defaults.platforms.tistory.base_url),
        };

        let wordpress = WordpressConfig {
            site_url: env_string("WORDPRESS_SITE_URL"),
            username: env_string("WORDPRESS_USERNAME"),
            app_password: env_string("WORDPRESS_APP_PASSWORD"),
            post_status: env_string("WORDPRESS_POST_STATUS")
                .unwrap_or(defaults.platforms.wordpress.post_status),
        };

        let log_level = env_string("NURI_LOG_LEVEL").unwrap_or(defaults.logging.level);
        let log_format = env_string("NURI_LOG_FORMAT").unwrap_or(defaults.logging.format);

        Ok(Self {
            database: DatabaseConfig {
                sqlite_path,
                busy_timeout_ms,
            },
            pipeline: PipelineConfig {
                draft_threshold,
                review_threshold,
            },
            dedup,
            dispatcher,
            platforms: PlatformsConfig { tistory, wordpress },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let dedup = &self.dedup;
        if !(0.0..=1.0).contains(&dedup.near_threshold) {
            anyhow::bail!("near_threshold must be within [0, 1]");
        }

        if !(0.0..=1.0).contains(&dedup.strict_threshold) {
            anyhow::bail!("strict_threshold must be within [0, 1]");
        }

        if dedup.strict_threshold < dedup.near_threshold {
            anyhow::bail!("strict_threshold must not be lower than near_threshold");
        }

        if dedup.candidate_limit == 0 {
            anyhow::bail!("candidate_limit must be greater than 0");
        }

        if dedup.max_similar == 0 {
            anyhow::bail!("max_similar must be greater than 0");
        }

        let dispatcher = &self.dispatcher;
        if dispatcher.max_retries == 0 {
            anyhow::bail!("max_retries must be greater than 0");
        }

        if dispatcher.sweep_interval_secs == 0 {
            anyhow::bail!("sweep_interval_secs must be greater than 0");
        }

        if dispatcher.platform_timeout_secs == 0 {
            anyhow::bail!("platform_timeout_secs must be greater than 0");
        }

        if dispatcher.requests_per_second == 0 {
            anyhow::bail!("requests_per_second must be greater than 0");
        }

        if dispatcher.base_delay_secs > dispatcher.max_delay_secs {
            anyhow::bail!("base_delay_secs must not exceed max_delay_secs");
        }

        if ![0u8, 1, 3].contains(&self.platforms.tistory.visibility) {
            anyhow::bail!("tistory visibility must be 0, 1 or 3");
        }

        if let Some(site) = &self.platforms.wordpress.site_url {
            url::Url::parse(site)
                .with_context(|| format!("Invalid WordPress site URL: {site}"))?;
        }

        Ok(())
    }

    /// Busy timeout for the SQLite connection
    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.database.busy_timeout_ms)
    }
}
