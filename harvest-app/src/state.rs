//! Application state management.

use crate::error::CommandError;
use async_trait::async_trait;
use harvest_browser::{BrowserEngine, SessionLauncher};
use harvest_core::{AppConfig, HarvestError, RecordId, ScrapeRequest};
use harvest_db::{Database, RecordStore};
use harvest_scheduler::{JobRunner, LocalJobQueue};
use harvest_scraper::{build_orchestrator, BatchOrchestrator, ScrapeError};
use std::sync::Arc;

/// Collaborators shared by every command, owned by the process entry point.
pub struct AppState {
    /// Effective configuration
    pub config: AppConfig,
    /// Record store
    pub db: Arc<Database>,
    /// Synchronous scrape pipeline
    pub orchestrator: Arc<BatchOrchestrator>,
    /// Deferred scrape pipeline
    pub queue: Arc<LocalJobQueue>,
}

impl AppState {
    /// Open the configured record store and wire the real browser.
    pub async fn initialize(config: AppConfig) -> Result<Self, CommandError> {
        let path = config.database_path().map_err(HarvestError::from)?;
        tracing::info!("Record store: {}", path.display());

        let db = Database::open(&path, config.storage.max_connections).await?;
        let launcher = Arc::new(BrowserEngine::new(&config));
        Self::with_components(config, Arc::new(db), launcher)
    }

    /// Wire state from already-built collaborators.
    pub fn with_components(
        config: AppConfig,
        db: Arc<Database>,
        launcher: Arc<dyn SessionLauncher>,
    ) -> Result<Self, CommandError> {
        let store: Arc<dyn RecordStore> = db.clone();
        let orchestrator = Arc::new(build_orchestrator(&config, launcher, store)?);
        let runner = Arc::new(ScrapeJobRunner::new(Arc::clone(&orchestrator)));
        let queue = Arc::new(
            LocalJobQueue::new(runner, config.queue.workers)
                .with_retention(config.queue.retain_finished),
        );

        Ok(Self {
            config,
            db,
            orchestrator,
            queue,
        })
    }

    /// Let queued jobs finish, then close the store.
    pub async fn shutdown(&self) {
        self.queue.wait_idle().await;
        self.queue.close();
        self.db.pool().close().await;
        tracing::debug!("Application state shut down");
    }
}

/// Runs deferred jobs through the same router and dedup gate as
/// synchronous scrapes.
pub struct ScrapeJobRunner {
    orchestrator: Arc<BatchOrchestrator>,
}

impl ScrapeJobRunner {
    /// Create a runner over `orchestrator`.
    #[must_use]
    pub fn new(orchestrator: Arc<BatchOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl JobRunner for ScrapeJobRunner {
    async fn run(&self, request: ScrapeRequest) -> Result<RecordId, HarvestError> {
        match self.orchestrator.scrape_one(request).await {
            Ok(saved) => Ok(saved.record.id),
            Err(ScrapeError::Storage(e)) => Err(e.into()),
            Err(e) => Err(HarvestError::Internal(e.to_string())),
        }
    }
}
