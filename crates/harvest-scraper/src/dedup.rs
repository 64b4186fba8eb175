//! Dedup gate: at most one stored record per content fingerprint.
//!
//! The lookup by hash is only a fast path. The store's uniqueness
//! constraint decides races: a rejected insert is followed by a read of the
//! record that won.

use crate::error::{Result, ScrapeError};
use harvest_core::Record;
use harvest_db::{InsertOutcome, RecordStore};
use serde::Serialize;
use std::sync::Arc;

/// Whether the gate wrote the candidate or returned an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DedupOutcome {
    /// The candidate was new and has been stored
    Inserted,
    /// A record with the same fingerprint was already stored
    Existing,
}

/// A record as it stands in the store after passing the gate.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedRecord {
    /// The stored record (the candidate, or the one it collided with)
    pub record: Record,
    /// How the record was obtained
    pub outcome: DedupOutcome,
}

/// Persists candidates unless identical content is already stored.
#[derive(Clone)]
pub struct DedupGate {
    store: Arc<dyn RecordStore>,
}

impl DedupGate {
    /// Create a gate over a record store.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// The store behind this gate.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Store `candidate` or return the record already holding its fingerprint.
    ///
    /// # Errors
    /// Storage failures during lookup or insert are returned as
    /// [`ScrapeError::Storage`].
    pub async fn save(&self, mut candidate: Record) -> Result<SavedRecord> {
        if candidate.content_hash.is_empty() {
            candidate.refresh_fingerprint();
        }

        if let Some(existing) = self.store.find_by_hash(&candidate.content_hash).await? {
            tracing::debug!(
                id = %existing.id,
                url = %candidate.url,
                "dedup hit, returning stored record"
            );
            return Ok(SavedRecord {
                record: existing,
                outcome: DedupOutcome::Existing,
            });
        }

        match self.store.insert(&candidate).await? {
            InsertOutcome::Inserted => {
                tracing::info!(id = %candidate.id, url = %candidate.url, "record stored");
                Ok(SavedRecord {
                    record: candidate,
                    outcome: DedupOutcome::Inserted,
                })
            }
            InsertOutcome::Duplicate => {
                // Lost the race to a concurrent writer.
                let winner = self
                    .store
                    .find_by_hash(&candidate.content_hash)
                    .await?
                    .ok_or_else(|| {
                        ScrapeError::Internal(format!(
                            "insert rejected as duplicate but no record holds {}",
                            candidate.content_hash
                        ))
                    })?;
                tracing::debug!(id = %winner.id, url = %candidate.url, "dedup race resolved");
                Ok(SavedRecord {
                    record: winner,
                    outcome: DedupOutcome::Existing,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use harvest_core::{ContentHash, Metadata, RecordId};
    use harvest_db::{Database, DatabaseError, RecordPage, RecordQuery, IN_MEMORY};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn candidate(url: &str) -> Record {
        Record::new(
            url,
            "Test Page",
            "<html><body>Test content</body></html>",
            "text/html",
            Metadata::new(),
            false,
            200,
        )
    }

    async fn gate() -> (DedupGate, Arc<Database>) {
        let db = Arc::new(Database::open(IN_MEMORY, 1).await.expect("open db"));
        (DedupGate::new(db.clone()), db)
    }

    #[tokio::test]
    async fn test_first_save_inserts() {
        let (gate, db) = gate().await;
        let record = candidate("https://one.example");

        let saved = gate.save(record.clone()).await.expect("save");

        assert_eq!(saved.outcome, DedupOutcome::Inserted);
        assert_eq!(saved.record.id, record.id);
        assert!(db.find_by_id(&record.id).await.expect("find").is_some());
    }

    #[tokio::test]
    async fn test_second_save_returns_existing() {
        let (gate, db) = gate().await;
        let first = gate.save(candidate("https://one.example")).await.expect("save");
        let second = gate.save(candidate("https://two.example")).await.expect("save");

        assert_eq!(second.outcome, DedupOutcome::Existing);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(second.record.url, "https://one.example");
        assert_eq!(db.query(&RecordQuery::default()).await.expect("query").total, 1);
    }

    #[tokio::test]
    async fn test_missing_fingerprint_is_computed() {
        let (gate, _db) = gate().await;
        let mut record = candidate("https://one.example");
        record.content_hash = ContentHash::from_hex("");

        let saved = gate.save(record).await.expect("save");

        assert_eq!(
            saved.record.content_hash,
            ContentHash::compute("Test Page", "<html><body>Test content</body></html>")
        );
    }

    /// Reports no match on the first lookup so the insert collides.
    struct RacingStore {
        inner: Database,
        first_lookup: AtomicBool,
    }

    #[async_trait]
    impl RecordStore for RacingStore {
        async fn find_by_hash(&self, hash: &ContentHash) -> harvest_db::Result<Option<Record>> {
            if self.first_lookup.swap(false, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_by_hash(hash).await
        }
        async fn insert(&self, record: &Record) -> harvest_db::Result<InsertOutcome> {
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

    #[tokio::test]
    async fn test_lost_race_reads_winner() {
        let inner = Database::open(IN_MEMORY, 1).await.expect("open db");
        let winner = candidate("https://winner.example");
        inner.insert(&winner).await.expect("seed");

        let gate = DedupGate::new(Arc::new(RacingStore {
            inner,
            first_lookup: AtomicBool::new(true),
        }));

        let saved = gate.save(candidate("https://loser.example")).await.expect("save");

        assert_eq!(saved.outcome, DedupOutcome::Existing);
        assert_eq!(saved.record.id, winner.id);
    }

    struct FailingStore;

    #[async_trait]
    impl RecordStore for FailingStore {
        async fn find_by_hash(&self, _hash: &ContentHash) -> harvest_db::Result<Option<Record>> {
            Err(DatabaseError::Open("disk gone".to_string()))
        }
        async fn insert(&self, _record: &Record) -> harvest_db::Result<InsertOutcome> {
            Err(DatabaseError::Open("disk gone".to_string()))
        }
        async fn find_by_id(&self, _id: &RecordId) -> harvest_db::Result<Option<Record>> {
            Ok(None)
        }
        async fn delete(&self, _id: &RecordId) -> harvest_db::Result<bool> {
            Ok(false)
        }
        async fn query(&self, _query: &RecordQuery) -> harvest_db::Result<RecordPage> {
            Err(DatabaseError::Open("disk gone".to_string()))
        }
    }

    #[tokio::test]
    async fn test_storage_errors_propagate() {
        let gate = DedupGate::new(Arc::new(FailingStore));

        let err = gate
            .save(candidate("https://one.example"))
            .await
            .expect_err("storage failure must surface");

        assert!(matches!(err, ScrapeError::Storage(_)));
    }
}
