//! Batch orchestrator for one-or-many URL requests.
//!
//! URLs are validated first; the survivors are acquired concurrently, at
//! most `max_concurrent` at a time, each in its own spawned task. Every task
//! runs to completion (no cancellation on first failure) and results are
//! returned in input order.

use crate::dedup::{DedupGate, SavedRecord};
use crate::error::{Result, ScrapeError};
use crate::router::{panic_message, AcquisitionRouter, UNEXPECTED_FAILURE_TITLE};
use futures::stream::{FuturesUnordered, StreamExt};
use harvest_core::{BatchConfig, BatchScrapeRequest, Record, ScrapeRequest};
use std::sync::Arc;

/// Result of a scrape: a single record when exactly one URL survived
/// validation, a list otherwise.
#[derive(Debug, Clone)]
pub enum ScrapeOutcome {
    /// Exactly one URL was acquired
    Single(SavedRecord),
    /// Several URLs were acquired, in input order
    Batch(Vec<SavedRecord>),
}

impl ScrapeOutcome {
    /// All records in input order.
    #[must_use]
    pub fn into_records(self) -> Vec<SavedRecord> {
        match self {
            Self::Single(record) => vec![record],
            Self::Batch(records) => records,
        }
    }
}

/// Fans requests out through the router and dedup gate.
#[derive(Clone)]
pub struct BatchOrchestrator {
    router: Arc<AcquisitionRouter>,
    gate: Arc<DedupGate>,
    max_concurrent: usize,
    max_urls: usize,
}

impl BatchOrchestrator {
    /// Create an orchestrator with default batch limits.
    #[must_use]
    pub fn new(router: Arc<AcquisitionRouter>, gate: Arc<DedupGate>) -> Self {
        let defaults = BatchConfig::default();
        Self {
            router,
            gate,
            max_concurrent: defaults.max_concurrent_scrapes,
            max_urls: defaults.max_urls,
        }
    }

    /// Set the maximum number of concurrent acquisitions.
    #[must_use]
    pub fn with_max_concurrent_scrapes(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    /// Set the largest accepted batch.
    #[must_use]
    pub fn with_max_urls(mut self, max: usize) -> Self {
        self.max_urls = max;
        self
    }

    /// Apply the `[batch]` configuration section.
    #[must_use]
    pub fn with_config(self, config: &BatchConfig) -> Self {
        self.with_max_concurrent_scrapes(config.max_concurrent_scrapes)
            .with_max_urls(config.max_urls)
    }

    /// The dedup gate used by this orchestrator.
    #[must_use]
    pub fn gate(&self) -> &Arc<DedupGate> {
        &self.gate
    }

    /// Validate a batch and return its surviving requests in order.
    ///
    /// # Errors
    /// [`ScrapeError::NoValidUrls`] when nothing survives,
    /// [`ScrapeError::TooManyUrls`] above the batch limit.
    pub fn prepare(&self, batch: &BatchScrapeRequest) -> Result<Vec<ScrapeRequest>> {
        let requests = batch
            .valid_requests()
            .map_err(|_| ScrapeError::NoValidUrls)?;
        if requests.len() > self.max_urls {
            return Err(ScrapeError::TooManyUrls {
                count: requests.len(),
                max: self.max_urls,
            });
        }
        Ok(requests)
    }

    /// Acquire and store one request.
    ///
    /// # Errors
    /// Only storage failures surface; acquisition failures are stored as
    /// degraded records.
    pub async fn scrape_one(&self, request: ScrapeRequest) -> Result<SavedRecord> {
        process(&self.router, &self.gate, &request).await
    }

    /// Run a single-or-batch request.
    ///
    /// # Errors
    /// Validation errors reject the request before any acquisition. A
    /// storage failure for any URL fails the call once all URLs finished.
    pub async fn run(&self, batch: &BatchScrapeRequest) -> Result<ScrapeOutcome> {
        let mut requests = self.prepare(batch)?;

        if requests.len() == 1 {
            if let Some(request) = requests.pop() {
                return Ok(ScrapeOutcome::Single(self.scrape_one(request).await?));
            }
        }

        Ok(ScrapeOutcome::Batch(self.run_all(requests).await?))
    }

    /// Acquire already-validated requests concurrently, preserving order.
    ///
    /// # Errors
    /// Returns the first storage failure (in input order) after every task
    /// has finished.
    pub async fn run_all(&self, requests: Vec<ScrapeRequest>) -> Result<Vec<SavedRecord>> {
        let total = requests.len();
        tracing::info!(
            urls = total,
            max_concurrent = self.max_concurrent,
            "starting batch scrape"
        );

        let mut slots: Vec<Option<Result<SavedRecord>>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);
        let originals: Vec<ScrapeRequest> = requests.clone();

        let mut tasks = FuturesUnordered::new();
        for (index, request) in requests.into_iter().enumerate() {
            let router = Arc::clone(&self.router);
            let gate = Arc::clone(&self.gate);
            let handle = tokio::spawn(async move { process(&router, &gate, &request).await });
            tasks.push(async move { (index, handle.await) });

            // Respect concurrency limit
            while tasks.len() >= self.max_concurrent {
                if let Some((index, joined)) = tasks.next().await {
                    slots[index] = Some(self.settle(&originals[index], joined).await);
                }
            }
        }

        // Collect remaining results
        while let Some((index, joined)) = tasks.next().await {
            slots[index] = Some(self.settle(&originals[index], joined).await);
        }

        let mut records = Vec::with_capacity(total);
        for slot in slots {
            match slot {
                Some(result) => records.push(result?),
                None => {
                    return Err(ScrapeError::Internal(
                        "batch task finished without a result".to_string(),
                    ))
                }
            }
        }

        let degraded = records.iter().filter(|r| r.record.is_degraded()).count();
        tracing::info!(urls = total, degraded, "batch scrape complete");
        Ok(records)
    }

    /// Turn a finished task into its slot value; a task that died is
    /// replaced by a stored degraded record.
    async fn settle(
        &self,
        request: &ScrapeRequest,
        joined: std::result::Result<Result<SavedRecord>, tokio::task::JoinError>,
    ) -> Result<SavedRecord> {
        match joined {
            Ok(result) => result,
            Err(e) => {
                let message = if e.is_panic() {
                    panic_message(e.into_panic().as_ref())
                } else {
                    e.to_string()
                };
                tracing::error!(url = %request.url(), "batch task failed: {}", message);
                let record = Record::degraded(
                    request.url_str(),
                    UNEXPECTED_FAILURE_TITLE,
                    format!("unexpected failure: {message}"),
                    request.use_dynamic_rendering(),
                );
                self.gate.save(record).await
            }
        }
    }
}

async fn process(
    router: &AcquisitionRouter,
    gate: &DedupGate,
    request: &ScrapeRequest,
) -> Result<SavedRecord> {
    let record = router.acquire(request).await;
    gate.save(record).await.map_err(|e| {
        tracing::error!(url = %request.url(), "failed to store record: {}", e);
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::DedupOutcome;
    use crate::strategy::Acquire;
    use async_trait::async_trait;
    use harvest_core::{ContentHash, Metadata, RecordId, ScrapeOptions};
    use harvest_db::{
        Database, DatabaseError, InsertOutcome, RecordPage, RecordQuery, RecordStore, IN_MEMORY,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Echoes the URL into the content; later URLs finish first.
    struct Echo {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Acquire for Echo {
        async fn acquire(&self, request: &ScrapeRequest) -> Record {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = match request.url().path() {
                "/a" => 60,
                "/b" => 30,
                _ => 5,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if request.url().path() == "/panic" {
                panic!("acquirer bug");
            }

            Record::new(
                request.url_str(),
                "Echo",
                request.url_str(),
                "text/plain",
                Metadata::new(),
                false,
                200,
            )
        }
    }

    async fn orchestrator(max_concurrent: usize) -> (BatchOrchestrator, Arc<Echo>) {
        let echo = Arc::new(Echo {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let router = AcquisitionRouter::new(echo.clone(), echo.clone());
        let db = Database::open(IN_MEMORY, 1).await.expect("open db");
        let orchestrator = BatchOrchestrator::new(
            Arc::new(router),
            Arc::new(DedupGate::new(Arc::new(db))),
        )
        .with_max_concurrent_scrapes(max_concurrent);
        (orchestrator, echo)
    }

    /// Panics when storing a healthy `/boom` record and fails for `/fail`.
    struct FlakyStore {
        inner: Database,
    }

    #[async_trait]
    impl RecordStore for FlakyStore {
        async fn find_by_hash(&self, hash: &ContentHash) -> harvest_db::Result<Option<Record>> {
            self.inner.find_by_hash(hash).await
        }

        async fn insert(&self, record: &Record) -> harvest_db::Result<InsertOutcome> {
            if record.url.ends_with("/boom") && !record.is_degraded() {
                panic!("store bug");
            }
            if record.url.ends_with("/fail") {
                return Err(DatabaseError::Open("disk full".to_string()));
            }
            self.inner.insert(record).await
        }

        async fn find_by_id(&self, id: &RecordId) -> harvest_db::Result<Option<Record>> {
            self.inner.find_by_id(id).await
        }

        async fn delete(&self, id: &RecordId) -> harvest_db::Result<bool> {
            self.inner.delete(id).await
        }

        async fn query(&self, query: &RecordQuery) -> harvest_db::Result<RecordPage> {
            self.inner.query(query).await
        }
    }

    async fn flaky_orchestrator(max_concurrent: usize) -> (BatchOrchestrator, Database) {
        let echo = Arc::new(Echo {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let router = AcquisitionRouter::new(echo.clone(), echo);
        let db = Database::open(IN_MEMORY, 1).await.expect("open db");
        let store = FlakyStore { inner: db.clone() };
        let orchestrator = BatchOrchestrator::new(
            Arc::new(router),
            Arc::new(DedupGate::new(Arc::new(store))),
        )
        .with_max_concurrent_scrapes(max_concurrent);
        (orchestrator, db)
    }

    #[tokio::test]
    async fn test_order_preserved() {
        let (orchestrator, _) = orchestrator(3).await;
        let batch = BatchScrapeRequest::new(
            ["https://x.example/a", "https://x.example/b", "https://x.example/c"],
            ScrapeOptions::default(),
        );

        let records = match orchestrator.run(&batch).await.expect("run") {
            ScrapeOutcome::Batch(records) => records,
            ScrapeOutcome::Single(_) => panic!("expected a batch"),
        };

        let urls: Vec<_> = records.iter().map(|r| r.record.url.as_str()).collect();
        assert_eq!(
            urls,
            ["https://x.example/a", "https://x.example/b", "https://x.example/c"]
        );
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let (orchestrator, echo) = orchestrator(2).await;
        let urls: Vec<String> = (0..6).map(|i| format!("https://x.example/{i}")).collect();
        let batch = BatchScrapeRequest::new(urls, ScrapeOptions::default());

        let records = orchestrator.run(&batch).await.expect("run").into_records();

        assert_eq!(records.len(), 6);
        assert!(echo.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_single_survivor_collapses() {
        let (orchestrator, _) = orchestrator(4).await;
        let batch = BatchScrapeRequest::new(
            ["https://x.example/only", "not-a-url", "   "],
            ScrapeOptions::default(),
        );

        let outcome = orchestrator.run(&batch).await.expect("run");
        assert!(matches!(outcome, ScrapeOutcome::Single(_)));
    }

    #[tokio::test]
    async fn test_no_valid_urls_rejected() {
        let (orchestrator, _) = orchestrator(4).await;
        let batch = BatchScrapeRequest {
            urls: vec![
                Some(String::new()),
                None,
                Some("   ".to_string()),
                Some("not-a-url".to_string()),
            ],
            options: ScrapeOptions::default(),
        };

        let err = orchestrator.run(&batch).await.expect_err("must reject");
        assert!(matches!(err, ScrapeError::NoValidUrls));
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_too_many_urls_rejected() {
        let (orchestrator, _) = orchestrator(4).await;
        let orchestrator = orchestrator.with_max_urls(2);
        let batch = BatchScrapeRequest::new(
            ["https://x.example/1", "https://x.example/2", "https://x.example/3"],
            ScrapeOptions::default(),
        );

        let err = orchestrator.run(&batch).await.expect_err("must reject");
        assert!(matches!(err, ScrapeError::TooManyUrls { count: 3, max: 2 }));
    }

    #[tokio::test]
    async fn test_panicking_task_is_isolated() {
        let (orchestrator, _) = orchestrator(4).await;
        let batch = BatchScrapeRequest::new(
            ["https://x.example/a", "https://x.example/panic", "https://x.example/c"],
            ScrapeOptions::default(),
        );

        let records = orchestrator.run(&batch).await.expect("run").into_records();

        assert_eq!(records.len(), 3);
        assert!(!records[0].record.is_degraded());
        assert!(records[1].record.is_degraded());
        assert_eq!(records[1].record.title, UNEXPECTED_FAILURE_TITLE);
        assert!(!records[2].record.is_degraded());
    }

    #[tokio::test]
    async fn test_task_dying_outside_router_is_stored_degraded() {
        let (orchestrator, db) = flaky_orchestrator(4).await;
        let batch = BatchScrapeRequest::new(
            ["https://x.example/a", "https://x.example/boom", "https://x.example/c"],
            ScrapeOptions::default(),
        );

        let records = orchestrator.run(&batch).await.expect("run").into_records();

        assert_eq!(records.len(), 3);
        assert!(!records[0].record.is_degraded());
        assert!(records[1].record.is_degraded());
        assert_eq!(records[1].record.title, UNEXPECTED_FAILURE_TITLE);
        assert_eq!(records[1].record.url, "https://x.example/boom");
        assert!(records[1].record.content.contains("store bug"));
        assert!(!records[2].record.is_degraded());

        let stored = db.query(&RecordQuery::default()).await.expect("query");
        assert_eq!(stored.total, 3);
    }

    #[tokio::test]
    async fn test_storage_failure_fails_batch_after_siblings_finish() {
        let (orchestrator, db) = flaky_orchestrator(1).await;
        let batch = BatchScrapeRequest::new(
            ["https://x.example/a", "https://x.example/fail", "https://x.example/c"],
            ScrapeOptions::default(),
        );

        let err = orchestrator.run(&batch).await.expect_err("storage failure surfaces");
        assert!(matches!(err, ScrapeError::Storage(_)));
        assert!(!err.is_validation());

        let stored = db.query(&RecordQuery::default()).await.expect("query");
        let urls: Vec<_> = stored.items.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(stored.total, 2);
        assert!(urls.contains(&"https://x.example/a"));
        assert!(urls.contains(&"https://x.example/c"));
    }

    #[tokio::test]
    async fn test_duplicate_urls_share_record() {
        let (orchestrator, _) = orchestrator(1).await;
        let batch = BatchScrapeRequest::new(
            ["https://x.example/same", "https://x.example/same"],
            ScrapeOptions::default(),
        );

        let records = orchestrator.run(&batch).await.expect("run").into_records();

        assert_eq!(records[0].outcome, DedupOutcome::Inserted);
        assert_eq!(records[1].outcome, DedupOutcome::Existing);
        assert_eq!(records[0].record.id, records[1].record.id);
    }
}
