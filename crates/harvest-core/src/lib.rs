//! Harvest Core - Foundation crate for the Harvest scraping pipeline.
//!
//! This crate provides the shared record model, request types, content
//! fingerprinting, error handling and configuration management that all
//! other Harvest crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and the persisted [`Record`]
//! - [`request`] - Validated scrape requests and shared options
//! - [`fingerprint`] - Stable content hashing used as the dedup key
//!
//! # Example
//!
//! ```rust
//! use harvest_core::{AppConfig, ContentHash};
//!
//! let config = AppConfig::default();
//! assert_eq!(config.batch.max_concurrent_scrapes, 4);
//!
//! let a = ContentHash::compute("Title", "<p>body</p>");
//! let b = ContentHash::compute("Title", "<p>body</p>");
//! assert_eq!(a, b);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod request;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BatchConfig, BrowserConfig, QueryConfig, QueueConfig, ScrapingConfig,
    StorageConfig,
};
pub use error::{ConfigError, ConfigResult, HarvestError, Result};
pub use fingerprint::ContentHash;
pub use request::{parse_target_url, BatchScrapeRequest, ScrapeOptions, ScrapeRequest};
pub use types::{Metadata, Record, RecordId, CUSTOM_SELECTORS_KEY, ERROR_STATUS_CODE};
