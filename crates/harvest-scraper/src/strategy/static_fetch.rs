//! Plain HTTP acquisition.

use super::{Acquire, STRATEGY_FAILURE_TITLE};
use crate::error::{Result, ScrapeError};
use crate::extractor;
use async_trait::async_trait;
use harvest_core::{Record, ScrapeRequest, ScrapingConfig};
use std::time::Duration;

/// Content type assumed when a response carries no `Content-Type`.
const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// Reasons a single GET did not produce a body.
#[derive(Debug, thiserror::Error)]
enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("content too large: {0} bytes")]
    ContentTooLarge(u64),
}

/// Fetches one URL with a non-rendering GET.
#[derive(Debug, Clone)]
pub struct StaticFetcher {
    client: reqwest::Client,
    max_content_bytes: usize,
}

impl StaticFetcher {
    /// Build the HTTP client with the spoofed user agent and timeout.
    pub fn new(config: &ScrapingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.request_timeout_secs.min(10)))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ScrapeError::Client(e.to_string()))?;

        Ok(Self {
            client,
            max_content_bytes: config.max_content_bytes,
        })
    }

    async fn fetch(&self, request: &ScrapeRequest) -> std::result::Result<Record, FetchError> {
        let response = self.client.get(request.url().as_str()).send().await?;

        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let limit = self.max_content_bytes as u64;
        if let Some(len) = response.content_length() {
            if len > limit {
                return Err(FetchError::ContentTooLarge(len));
            }
        }

        let bytes = response.bytes().await?;
        if bytes.len() as u64 > limit {
            return Err(FetchError::ContentTooLarge(bytes.len() as u64));
        }
        let body = String::from_utf8_lossy(&bytes).into_owned();

        let mut extraction = extractor::extract(&body, &content_type, request.url());
        if content_type.to_ascii_lowercase().contains("html") {
            let captures = extractor::select_fields(&body, request.selectors());
            extractor::merge_custom_selectors(&mut extraction.metadata, captures);
        }

        Ok(Record::new(
            request.url_str(),
            extraction.title,
            body,
            content_type,
            extraction.metadata,
            false,
            status_code,
        ))
    }
}

#[async_trait]
impl Acquire for StaticFetcher {
    async fn acquire(&self, request: &ScrapeRequest) -> Record {
        match self.fetch(request).await {
            Ok(record) => {
                tracing::debug!(
                    url = %request.url(),
                    status = record.status_code,
                    "static fetch complete"
                );
                record
            }
            Err(e) => {
                tracing::warn!(url = %request.url(), "static fetch failed: {}", e);
                Record::degraded(request.url_str(), STRATEGY_FAILURE_TITLE, e.to_string(), false)
            }
        }
    }
}
