//! Headless browser acquisition.
//!
//! Each call launches its own session and closes it before returning, on
//! success, on error and on panic. The settle delay after navigation is a
//! fixed sleep, not a network-idle detector, so pages that keep loading
//! past it are captured part-way.

use super::{Acquire, STRATEGY_FAILURE_TITLE};
use crate::extractor;
use async_trait::async_trait;
use futures::FutureExt;
use harvest_browser::{BrowserActions, BrowserError, SessionLauncher};
use harvest_core::{Metadata, Record, ScrapeRequest};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// Collects `<meta name|property content>` pairs inside the page.
const META_TAGS_SCRIPT: &str = "(() => { \
    const out = {}; \
    document.querySelectorAll('meta').forEach(m => { \
        const key = m.getAttribute('name') || m.getAttribute('property'); \
        const value = m.getAttribute('content'); \
        if (key && value !== null) { out[key] = value; } \
    }); \
    return out; })()";

/// Renders pages in an exclusive browser session.
#[derive(Clone)]
pub struct DynamicRenderer {
    launcher: Arc<dyn SessionLauncher>,
}

impl DynamicRenderer {
    pub fn new(launcher: Arc<dyn SessionLauncher>) -> Self {
        Self { launcher }
    }

    async fn render(
        session: &dyn BrowserActions,
        request: &ScrapeRequest,
    ) -> Result<Record, BrowserError> {
        let navigation = session.navigate(request.url_str()).await?;

        tokio::time::sleep(Duration::from_millis(request.render_wait_ms())).await;

        let content = session.content().await?;
        let title = match session.title().await? {
            Some(title) if !title.trim().is_empty() => title.trim().to_string(),
            _ => extractor::html_title(&content),
        };

        let mut metadata = match session.evaluate_json(META_TAGS_SCRIPT).await {
            Ok(Value::Object(map)) => map,
            Ok(_) => Metadata::new(),
            Err(e) => {
                tracing::warn!(url = %request.url(), "meta tag harvest failed: {}", e);
                Metadata::new()
            }
        };

        let mut captures = Metadata::new();
        for (field, selector) in request.selectors() {
            match session.extract_text(selector).await {
                Ok(text) if !text.is_empty() => {
                    captures.insert(field.clone(), Value::String(text));
                }
                Ok(_) => {
                    tracing::warn!(field = %field, selector = %selector, "selector text empty");
                }
                Err(e) => {
                    tracing::warn!(field = %field, selector = %selector, "selector failed: {}", e);
                }
            }
        }
        extractor::merge_custom_selectors(&mut metadata, captures);

        Ok(Record::new(
            request.url_str(),
            title,
            content,
            navigation.content_type,
            metadata,
            true,
            navigation.status_code,
        ))
    }
}

#[async_trait]
impl Acquire for DynamicRenderer {
    async fn acquire(&self, request: &ScrapeRequest) -> Record {
        let mut session = match self.launcher.launch().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(url = %request.url(), "browser launch failed: {}", e);
                return Record::degraded(request.url_str(), STRATEGY_FAILURE_TITLE, e.to_string(), true);
            }
        };

        let rendered = AssertUnwindSafe(Self::render(session.as_ref(), request))
            .catch_unwind()
            .await;

        if let Err(e) = session.close().await {
            tracing::warn!(url = %request.url(), "browser session close failed: {}", e);
        }

        match rendered {
            Ok(Ok(record)) => {
                tracing::debug!(
                    url = %request.url(),
                    status = record.status_code,
                    "dynamic render complete"
                );
                record
            }
            Ok(Err(e)) => {
                tracing::warn!(url = %request.url(), "dynamic render failed: {}", e);
                Record::degraded(request.url_str(), STRATEGY_FAILURE_TITLE, e.to_string(), true)
            }
            Err(_) => {
                tracing::error!(url = %request.url(), "dynamic render panicked");
                Record::degraded(
                    request.url_str(),
                    STRATEGY_FAILURE_TITLE,
                    "render task panicked",
                    true,
                )
            }
        }
    }
}
