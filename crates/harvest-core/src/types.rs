//! Shared types used across the Harvest pipeline.
//!
//! This module defines the persisted [`Record`] and the newtypes that give
//! its identifiers type safety.

use crate::error::HarvestError;
use crate::fingerprint::ContentHash;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Status code carried by degraded records produced in place of an error.
pub const ERROR_STATUS_CODE: u16 = 500;

/// Metadata key under which custom selector captures are merged.
pub const CUSTOM_SELECTORS_KEY: &str = "customSelectors";

/// Record metadata: meta tags keyed by name, plus an optional
/// `customSelectors` object.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Newtype for record identifiers with validation.
///
/// Record IDs are UUID v4 strings, assigned once when the record is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Create a new `RecordId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is not a valid UUID v4.
    pub fn new(id: impl Into<String>) -> Result<Self, HarvestError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Create a new random `RecordId` using UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), HarvestError> {
        static UUID_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = UUID_REGEX.get_or_init(|| {
            Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
                .expect("valid regex")
        });

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(HarvestError::Validation(format!(
                "invalid record ID: must be a valid UUID v4, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The persisted unit produced by one acquisition.
///
/// A record is built in memory by the acquisition router, fingerprinted at
/// construction, and then either discarded in favour of an existing record
/// with the same [`ContentHash`] or persisted exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Unique identifier, never reused
    pub id: RecordId,
    /// URL the content was acquired from
    pub url: String,
    /// Extracted or synthesized title
    pub title: String,
    /// Raw textual body (or error text for degraded records)
    pub content: String,
    /// Declared content type
    pub content_type: String,
    /// Meta tags and custom selector captures
    pub metadata: Metadata,
    /// Acquisition time (UTC)
    pub scraped_at: DateTime<Utc>,
    /// Fingerprint over title + content
    pub content_hash: ContentHash,
    /// Whether the dynamic render strategy produced this record
    pub is_dynamic: bool,
    /// Transport status, or [`ERROR_STATUS_CODE`] for internal failures
    pub status_code: u16,
}

impl Record {
    /// Build a new record stamped with a fresh id, the current time and
    /// its content fingerprint.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        content_type: impl Into<String>,
        metadata: Metadata,
        is_dynamic: bool,
        status_code: u16,
    ) -> Self {
        let title = title.into();
        let content = content.into();
        let content_hash = ContentHash::compute(&title, &content);

        Self {
            id: RecordId::generate(),
            url: url.into(),
            title,
            content,
            content_type: content_type.into(),
            metadata,
            scraped_at: Utc::now(),
            content_hash,
            is_dynamic,
            status_code,
        }
    }

    /// Build a degraded record describing a failure in place of an error.
    ///
    /// The content is `"<url>: <error>"`, so the same failure at two URLs
    /// yields two distinct fingerprints.
    #[must_use]
    pub fn degraded(
        url: impl Into<String>,
        title: impl Into<String>,
        error: impl AsRef<str>,
        is_dynamic: bool,
    ) -> Self {
        let url = url.into();
        let content = format!("{url}: {}", error.as_ref());
        Self::new(
            url,
            title,
            content,
            "text/plain",
            Metadata::new(),
            is_dynamic,
            ERROR_STATUS_CODE,
        )
    }

    /// Recompute the fingerprint from the current title and content.
    pub fn refresh_fingerprint(&mut self) {
        self.content_hash = ContentHash::compute(&self.title, &self.content);
    }

    /// True when this record was produced in place of a failure.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.status_code == ERROR_STATUS_CODE
    }
}
