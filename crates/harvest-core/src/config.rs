//! Configuration management for Harvest.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Spoofed desktop user agent used by both acquisition strategies.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Main application configuration.
///
/// This is loaded from `~/.config/harvest/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Acquisition settings shared by both strategies
    pub scraping: ScrapingConfig,
    /// Headless browser settings
    pub browser: BrowserConfig,
    /// Batch fan-out settings
    pub batch: BatchConfig,
    /// Background job queue settings
    pub queue: QueueConfig,
    /// Record store settings
    pub storage: StorageConfig,
    /// Record listing settings
    pub query: QueryConfig,
}

impl AppConfig {
    /// Load configuration from the default location, falling back to
    /// defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path.
    ///
    /// Unlike [`AppConfig::load`], a missing file is an error here.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `HARVEST_DATABASE_PATH`: Override the record store location
    /// - `HARVEST_HEADLESS`: Override browser headless mode (true/false)
    /// - `HARVEST_MAX_CONCURRENT`: Override batch concurrency
    /// - `HARVEST_USER_AGENT`: Override the spoofed user agent
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("HARVEST_DATABASE_PATH") {
            tracing::debug!("Override storage.database_path from env: {}", val);
            self.storage.database_path = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("HARVEST_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("HARVEST_MAX_CONCURRENT") {
            if let Ok(max) = val.parse() {
                self.batch.max_concurrent_scrapes = max;
                tracing::debug!("Override batch.max_concurrent_scrapes from env: {}", max);
            }
        }

        if let Ok(val) = std::env::var("HARVEST_USER_AGENT") {
            if !val.trim().is_empty() {
                tracing::debug!("Override scraping.user_agent from env");
                self.scraping.user_agent = val;
            }
        }

        self
    }

    /// Load configuration (default location) with environment variable overrides.
    pub fn load_with_env() -> ConfigResult<Self> {
        let config = Self::load()?.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would stall the pipeline.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.batch.max_concurrent_scrapes == 0 {
            return Err(invalid("batch.max_concurrent_scrapes", "must be at least 1"));
        }
        if self.batch.max_urls == 0 {
            return Err(invalid("batch.max_urls", "must be at least 1"));
        }
        if self.queue.workers == 0 {
            return Err(invalid("queue.workers", "must be at least 1"));
        }
        if self.queue.retain_finished == 0 {
            return Err(invalid("queue.retain_finished", "must be at least 1"));
        }
        if self.query.default_page_size == 0 || self.query.max_page_size == 0 {
            return Err(invalid("query.page_size", "must be at least 1"));
        }
        if self.scraping.request_timeout_secs == 0 {
            return Err(invalid("scraping.request_timeout_secs", "must be at least 1"));
        }
        if self.storage.max_connections == 0 {
            return Err(invalid("storage.max_connections", "must be at least 1"));
        }
        Ok(())
    }

    /// Save configuration to the default location.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| invalid("config_path", "no parent directory"))?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/harvest/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/harvest`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.data_dir().to_path_buf())
    }

    /// Resolve the record store path: the configured one, or
    /// `<data_dir>/harvest.db`.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("harvest.db")),
        }
    }
}

fn project_dirs() -> ConfigResult<ProjectDirs> {
    ProjectDirs::from("com", "harvest", "harvest").ok_or(ConfigError::NoConfigDir)
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Acquisition settings shared by both strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// User agent string sent by the static fetcher and the browser
    pub user_agent: String,
    /// HTTP client timeout in seconds
    pub request_timeout_secs: u64,
    /// Settle delay used when a request does not specify one
    pub default_wait_ms: u64,
    /// Upper bound for caller-supplied settle delays
    pub max_wait_ms: u64,
    /// Maximum response body size accepted by the static fetcher
    pub max_content_bytes: usize,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 30,
            default_wait_ms: 5000,
            max_wait_ms: 60_000,
            max_content_bytes: 10 * 1024 * 1024, // 10 MB
        }
    }
}

/// Headless browser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Browser launch timeout in seconds
    pub launch_timeout_secs: u64,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// Pass `--no-sandbox` to Chromium
    pub no_sandbox: bool,
    /// Explicit Chromium executable (auto-detected when absent)
    pub executable: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            launch_timeout_secs: 30,
            navigation_timeout_secs: 30,
            no_sandbox: true,
            executable: None,
        }
    }
}

/// Batch fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of URLs acquired concurrently within one batch
    pub max_concurrent_scrapes: usize,
    /// Largest accepted batch after filtering
    pub max_urls: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_scrapes: 4,
            max_urls: 100,
        }
    }
}

/// Background job queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Number of jobs executed at once
    pub workers: usize,
    /// Finished jobs kept for status lookups; older ones are evicted
    pub retain_finished: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            retain_finished: 1000,
        }
    }
}

/// Record store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `SQLite` database file (defaults to `<data_dir>/harvest.db`)
    pub database_path: Option<PathBuf>,
    /// Connection pool size
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            max_connections: 5,
        }
    }
}

/// Record listing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Page size when the caller gives none
    pub default_page_size: u32,
    /// Largest page size honoured
    pub max_page_size: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}
