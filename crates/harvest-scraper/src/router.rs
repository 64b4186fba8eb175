//! Acquisition router.
//!
//! Dispatches each request to the strategy it asks for and guarantees a
//! record comes back, whatever happens inside the strategy.

use crate::strategy::{Acquire, Strategy};
use futures::FutureExt;
use harvest_core::{Record, ScrapeRequest};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Title carried by records produced in place of an unexpected failure.
pub const UNEXPECTED_FAILURE_TITLE: &str = "Scrape failed";

/// Routes requests to the static or dynamic strategy.
#[derive(Clone)]
pub struct AcquisitionRouter {
    static_fetch: Arc<dyn Acquire>,
    dynamic_render: Arc<dyn Acquire>,
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl AcquisitionRouter {
    /// Create a router over the two strategies.
    #[must_use]
    pub fn new(static_fetch: Arc<dyn Acquire>, dynamic_render: Arc<dyn Acquire>) -> Self {
        Self {
            static_fetch,
            dynamic_render,
        }
    }

    /// Acquire one request. Never fails: strategy failures and panics are
    /// returned as degraded records.
    pub async fn acquire(&self, request: &ScrapeRequest) -> Record {
        let strategy = Strategy::for_request(request);
        let acquirer = match strategy {
            Strategy::Static => &self.static_fetch,
            Strategy::Dynamic => &self.dynamic_render,
        };

        tracing::debug!(url = %request.url(), ?strategy, "acquiring");

        match AssertUnwindSafe(acquirer.acquire(request)).catch_unwind().await {
            Ok(record) => record,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(url = %request.url(), "acquisition panicked: {}", message);
                Record::degraded(
                    request.url_str(),
                    UNEXPECTED_FAILURE_TITLE,
                    format!("unexpected failure: {message}"),
                    request.use_dynamic_rendering(),
                )
            }
        }
    }
}
