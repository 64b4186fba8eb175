//! The `RecordStore` seam used by the scraping pipeline.
//!
//! The dedup gate and command layer talk to storage only through this trait,
//! so tests can substitute an in-memory or failing store.

use crate::error::Result;
use crate::records::{self, InsertOutcome, RecordPage, RecordQuery};
use crate::Database;
use async_trait::async_trait;
use harvest_core::{ContentHash, Record, RecordId};

/// Durable collection of records keyed by id and unique by fingerprint.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Look up the record carrying a fingerprint.
    async fn find_by_hash(&self, hash: &ContentHash) -> Result<Option<Record>>;

    /// Persist a record unless its fingerprint is already stored.
    async fn insert(&self, record: &Record) -> Result<InsertOutcome>;

    /// Fetch a record by id.
    async fn find_by_id(&self, id: &RecordId) -> Result<Option<Record>>;

    /// Remove a record by id, returning whether anything was removed.
    async fn delete(&self, id: &RecordId) -> Result<bool>;

    /// List records matching a query, newest first.
    async fn query(&self, query: &RecordQuery) -> Result<RecordPage>;
}

#[async_trait]
impl RecordStore for Database {
    async fn find_by_hash(&self, hash: &ContentHash) -> Result<Option<Record>> {
        records::find_by_hash(self.pool(), hash).await
    }

    async fn insert(&self, record: &Record) -> Result<InsertOutcome> {
        records::insert_record(self.pool(), record).await
    }

    async fn find_by_id(&self, id: &RecordId) -> Result<Option<Record>> {
        records::find_by_id(self.pool(), id).await
    }

    async fn delete(&self, id: &RecordId) -> Result<bool> {
        records::delete_record(self.pool(), id).await
    }

    async fn query(&self, query: &RecordQuery) -> Result<RecordPage> {
        records::query_records(self.pool(), query).await
    }
}
