//! Acquisition strategies.
//!
//! Both strategies honour the same contract: given a request they always
//! produce a [`Record`], turning their own failures into degraded records.

pub mod dynamic_render;
pub mod static_fetch;

pub use dynamic_render::DynamicRenderer;
pub use static_fetch::StaticFetcher;

use async_trait::async_trait;
use harvest_core::{Record, ScrapeRequest};

/// Title carried by records produced in place of a strategy failure.
pub const STRATEGY_FAILURE_TITLE: &str = "Error";

/// How a request is acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One plain HTTP GET
    Static,
    /// Headless browser render with a settle delay
    Dynamic,
}

impl Strategy {
    /// Pick the strategy a request asks for.
    #[must_use]
    pub fn for_request(request: &ScrapeRequest) -> Self {
        if request.use_dynamic_rendering() {
            Self::Dynamic
        } else {
            Self::Static
        }
    }
}

/// A way of turning one request into one record.
#[async_trait]
pub trait Acquire: Send + Sync {
    /// Acquire the request's URL. Failures come back as degraded records.
    async fn acquire(&self, request: &ScrapeRequest) -> Record;
}
