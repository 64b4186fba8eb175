//! Harvest Scraper - acquisition, extraction and deduplication pipeline.
//!
//! A request flows through the [`AcquisitionRouter`] (static fetch or
//! dynamic render), the [`extractor`], the content fingerprint and finally the
//! [`DedupGate`], which stores at most one record per fingerprint. The
//! [`BatchOrchestrator`] fans multi-URL requests out with bounded
//! concurrency and failure isolation.
//!
//! # Example
//!
//! ```rust,ignore
//! use harvest_scraper::{build_orchestrator, ScrapeOutcome};
//!
//! let orchestrator = build_orchestrator(&config, launcher, store)?;
//! let outcome = orchestrator.run(&batch).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod dedup;
#[allow(missing_docs)]
pub mod error;
pub mod extractor;
pub mod orchestrator;
pub mod router;
#[allow(missing_docs)]
pub mod strategy;

// Re-export commonly used types
pub use dedup::{DedupGate, DedupOutcome, SavedRecord};
pub use error::{Result, ScrapeError};
pub use orchestrator::{BatchOrchestrator, ScrapeOutcome};
pub use router::AcquisitionRouter;
pub use strategy::{Acquire, DynamicRenderer, StaticFetcher, Strategy};

use harvest_browser::SessionLauncher;
use harvest_core::AppConfig;
use harvest_db::RecordStore;
use std::sync::Arc;

/// Wire strategies, router, gate and orchestrator from configuration.
///
/// # Errors
/// Returns [`ScrapeError::Client`] if the HTTP client cannot be built.
pub fn build_orchestrator(
    config: &AppConfig,
    launcher: Arc<dyn SessionLauncher>,
    store: Arc<dyn RecordStore>,
) -> Result<BatchOrchestrator> {
    let router = AcquisitionRouter::new(
        Arc::new(StaticFetcher::new(&config.scraping)?),
        Arc::new(DynamicRenderer::new(launcher)),
    );
    let gate = DedupGate::new(store);

    Ok(BatchOrchestrator::new(Arc::new(router), Arc::new(gate)).with_config(&config.batch))
}
