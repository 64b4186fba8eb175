//! Scrape requests and URL validation.
//!
//! A [`ScrapeRequest`] targets exactly one validated URL and is immutable
//! once built. A [`BatchScrapeRequest`] carries raw caller input; blank and
//! malformed entries are filtered out by [`BatchScrapeRequest::valid_requests`]
//! rather than failing the whole batch.

use crate::error::{HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Default settle delay for dynamic rendering.
pub const DEFAULT_RENDER_WAIT_MS: u64 = 5000;

/// Options shared by every URL of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeOptions {
    /// Render with a headless browser instead of a plain GET
    pub use_dynamic_rendering: bool,
    /// Fixed settle delay after navigation, in milliseconds
    pub render_wait_ms: u64,
    /// Field name -> CSS selector captures
    pub selectors: BTreeMap<String, String>,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            use_dynamic_rendering: false,
            render_wait_ms: DEFAULT_RENDER_WAIT_MS,
            selectors: BTreeMap::new(),
        }
    }
}

impl ScrapeOptions {
    /// Clamp the render wait to `max_wait_ms`.
    #[must_use]
    pub fn with_max_wait(mut self, max_wait_ms: u64) -> Self {
        self.render_wait_ms = self.render_wait_ms.min(max_wait_ms);
        self
    }
}

/// Validate a caller-supplied URL.
///
/// Accepts absolute `http`/`https` URLs with a host. Surrounding whitespace
/// is ignored.
///
/// # Errors
/// Returns `HarvestError::Validation` for blank, relative or non-web URLs.
pub fn parse_target_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(HarvestError::Validation("URL is required".to_string()));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| HarvestError::Validation(format!("invalid URL '{trimmed}': {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(HarvestError::Validation(format!(
            "unsupported URL scheme '{}' in '{trimmed}'",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(HarvestError::Validation(format!(
            "URL has no host: '{trimmed}'"
        )));
    }

    Ok(url)
}

/// A request to acquire one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    url: Url,
    options: ScrapeOptions,
}

impl ScrapeRequest {
    /// Build a request, validating the URL.
    ///
    /// # Errors
    /// Returns `HarvestError::Validation` if the URL is missing or malformed.
    pub fn new(url: &str, options: ScrapeOptions) -> Result<Self> {
        let url = parse_target_url(url)?;
        Ok(Self { url, options })
    }

    /// The validated target URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The target URL as a string.
    #[must_use]
    pub fn url_str(&self) -> &str {
        self.url.as_str()
    }

    /// Shared scraping options.
    #[must_use]
    pub fn options(&self) -> &ScrapeOptions {
        &self.options
    }

    /// Whether the dynamic render strategy should be used.
    #[must_use]
    pub fn use_dynamic_rendering(&self) -> bool {
        self.options.use_dynamic_rendering
    }

    /// Settle delay after navigation.
    #[must_use]
    pub fn render_wait_ms(&self) -> u64 {
        self.options.render_wait_ms
    }

    /// Named selector captures.
    #[must_use]
    pub fn selectors(&self) -> &BTreeMap<String, String> {
        &self.options.selectors
    }
}

/// Raw multi-URL input sharing one set of options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchScrapeRequest {
    /// Candidate URLs in caller order; `None` stands for a JSON `null`
    pub urls: Vec<Option<String>>,
    /// Options applied uniformly to every URL
    pub options: ScrapeOptions,
}

impl BatchScrapeRequest {
    /// Build a batch from plain strings.
    #[must_use]
    pub fn new<I, S>(urls: I, options: ScrapeOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(|u| Some(u.into())).collect(),
            options,
        }
    }

    /// Keep the entries that validate, preserving caller order.
    ///
    /// Invalid entries are dropped with a debug log line.
    ///
    /// # Errors
    /// Returns `HarvestError::Validation` when nothing survives.
    pub fn valid_requests(&self) -> Result<Vec<ScrapeRequest>> {
        let requests: Vec<ScrapeRequest> = self
            .urls
            .iter()
            .filter_map(|candidate| {
                let raw = candidate.as_deref()?;
                match ScrapeRequest::new(raw, self.options.clone()) {
                    Ok(request) => Some(request),
                    Err(e) => {
                        tracing::debug!(url = %raw, error = %e, "dropping invalid batch entry");
                        None
                    }
                }
            })
            .collect();

        if requests.is_empty() {
            return Err(HarvestError::Validation(
                "no valid URLs provided".to_string(),
            ));
        }

        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_urls() {
        assert!(parse_target_url("https://example.com").is_ok());
        assert!(parse_target_url("http://example.com/path?q=1").is_ok());
        assert_eq!(
            parse_target_url("  https://example.com/a  ")
                .expect("trimmed url")
                .as_str(),
            "https://example.com/a"
        );
    }

    #[test]
    fn test_parse_invalid_urls() {
        assert!(parse_target_url("").is_err());
        assert!(parse_target_url("   ").is_err());
        assert!(parse_target_url("not-a-url").is_err());
        assert!(parse_target_url("/relative/path").is_err());
        assert!(parse_target_url("ftp://example.com/file").is_err());
        assert!(parse_target_url("mailto:someone@example.com").is_err());
    }

    #[test]
    fn test_default_options() {
        let options = ScrapeOptions::default();
        assert!(!options.use_dynamic_rendering);
        assert_eq!(options.render_wait_ms, 5000);
        assert!(options.selectors.is_empty());
    }

    #[test]
    fn test_max_wait_clamp() {
        let options = ScrapeOptions {
            render_wait_ms: 120_000,
            ..ScrapeOptions::default()
        }
        .with_max_wait(60_000);
        assert_eq!(options.render_wait_ms, 60_000);
    }

    #[test]
    fn test_request_rejects_bad_url() {
        let result = ScrapeRequest::new("not-a-url", ScrapeOptions::default());
        assert!(matches!(result, Err(HarvestError::Validation(_))));
    }

    #[test]
    fn test_batch_all_invalid() {
        let batch = BatchScrapeRequest {
            urls: vec![
                Some(String::new()),
                None,
                Some("   ".to_string()),
                Some("not-a-url".to_string()),
            ],
            options: ScrapeOptions::default(),
        };
        assert!(matches!(
            batch.valid_requests(),
            Err(HarvestError::Validation(_))
        ));
    }

    #[test]
    fn test_batch_filters_and_preserves_order() {
        let batch = BatchScrapeRequest::new(
            [
                "https://c.example.com",
                "not-a-url",
                "https://a.example.com",
                "",
                "https://b.example.com",
            ],
            ScrapeOptions::default(),
        );
        let requests = batch.valid_requests().expect("some valid");
        let urls: Vec<_> = requests.iter().map(ScrapeRequest::url_str).collect();
        assert_eq!(
            urls,
            vec![
                "https://c.example.com/",
                "https://a.example.com/",
                "https://b.example.com/"
            ]
        );
    }
}
