//! Application configuration structures.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Archive source endpoints and edition selection
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Content-store upload settings
    #[serde(default)]
    pub upload: UploadConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.archive.base_url.trim().is_empty() {
            return Err(AppError::validation("archive.base_url is empty"));
        }
        if self.archive.edition.trim().is_empty() {
            return Err(AppError::validation("archive.edition is empty"));
        }
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.retry_attempts == 0 {
            return Err(AppError::validation("crawler.retry_attempts must be > 0"));
        }
        if self.upload.identifier_prefix.trim().is_empty() {
            return Err(AppError::validation("upload.identifier_prefix is empty"));
        }
        Ok(())
    }
}

/// Archive source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Base URL of the archive site
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Headboard/edition code distinguishing parallel publication lines
    #[serde(default = "defaults::edition")]
    pub edition: String,

    /// First day of the archive's span (default crawl start)
    #[serde(default = "defaults::start_date")]
    pub start_date: String,

    /// Day after the last day of the archive's span (default crawl end)
    #[serde(default = "defaults::end_date")]
    pub end_date: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            edition: defaults::edition(),
            start_date: defaults::start_date(),
            end_date: defaults::end_date(),
        }
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay around each request in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Delay after each page image download in milliseconds
    #[serde(default = "defaults::image_delay")]
    pub image_delay_ms: u64,

    /// Cooldown after a rejected (non-image) page download in milliseconds
    #[serde(default = "defaults::mismatch_cooldown")]
    pub mismatch_cooldown_ms: u64,

    /// Delay between days in milliseconds
    #[serde(default = "defaults::day_delay")]
    pub day_delay_ms: u64,

    /// Cooldown after a failed or incomplete day in milliseconds
    #[serde(default = "defaults::failure_cooldown")]
    pub failure_cooldown_ms: u64,

    /// Attempts per request for transient (5xx) failures
    #[serde(default = "defaults::retry_attempts")]
    pub retry_attempts: u32,

    /// Backoff between retry attempts in milliseconds
    #[serde(default = "defaults::retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            image_delay_ms: defaults::image_delay(),
            mismatch_cooldown_ms: defaults::mismatch_cooldown(),
            day_delay_ms: defaults::day_delay(),
            failure_cooldown_ms: defaults::failure_cooldown(),
            retry_attempts: defaults::retry_attempts(),
            retry_backoff_ms: defaults::retry_backoff(),
        }
    }
}

/// Content-store upload settings.
///
/// The named fields cover the store's fixed metadata template; anything
/// store-specific beyond them goes in `extra` and is passed through
/// unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Endpoint accepting PUT {endpoint}/{identifier}/{filename}
    #[serde(default = "defaults::upload_endpoint")]
    pub endpoint: String,

    /// Endpoint answering GET {endpoint}/{identifier} with item metadata
    #[serde(default = "defaults::metadata_endpoint")]
    pub metadata_endpoint: String,

    /// Prefix for derived remote identifiers
    #[serde(default = "defaults::identifier_prefix")]
    pub identifier_prefix: String,

    /// Collection tag
    #[serde(default = "defaults::collection")]
    pub collection: String,

    /// License URL
    #[serde(default = "defaults::license_url")]
    pub license_url: String,

    /// Media type of the uploaded items
    #[serde(default = "defaults::mediatype")]
    pub mediatype: String,

    /// Free-text description template; `{title}` and `{date}` are replaced
    #[serde(default = "defaults::description")]
    pub description: String,

    /// Residual store-specific metadata fields, passed through unchanged
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::upload_endpoint(),
            metadata_endpoint: defaults::metadata_endpoint(),
            identifier_prefix: defaults::identifier_prefix(),
            collection: defaults::collection(),
            license_url: defaults::license_url(),
            mediatype: defaults::mediatype(),
            description: defaults::description(),
            extra: BTreeMap::new(),
        }
    }
}

mod defaults {
    // Archive defaults
    pub fn base_url() -> String {
        "http://www.archiviolastampa.it".into()
    }
    pub fn edition() -> String {
        "01".into()
    }
    pub fn start_date() -> String {
        "1868-01-01".into()
    }
    pub fn end_date() -> String {
        "2005-12-31".into()
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; emeroteca/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        100
    }
    pub fn image_delay() -> u64 {
        200
    }
    pub fn mismatch_cooldown() -> u64 {
        5_000
    }
    pub fn day_delay() -> u64 {
        2_000
    }
    pub fn failure_cooldown() -> u64 {
        30_000
    }
    pub fn retry_attempts() -> u32 {
        3
    }
    pub fn retry_backoff() -> u64 {
        1_000
    }

    // Upload defaults
    pub fn upload_endpoint() -> String {
        "https://s3.us.archive.org".into()
    }
    pub fn metadata_endpoint() -> String {
        "https://archive.org/metadata".into()
    }
    pub fn identifier_prefix() -> String {
        "lastampa".into()
    }
    pub fn collection() -> String {
        "opensource".into()
    }
    pub fn license_url() -> String {
        "https://rightsstatements.org/vocab/CNE/1.0/".into()
    }
    pub fn mediatype() -> String {
        "texts".into()
    }
    pub fn description() -> String {
        "{title}, issue of {date}. Page scans and per-page metadata.".into()
    }
}
