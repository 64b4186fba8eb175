//! Harvest Database Layer
//!
//! Provides the `SQLite` record store for acquired pages. Uses `SQLx` with
//! embedded migrations.
//!
//! # Architecture
//!
//! - **Uniqueness**: `records.content_hash` is `UNIQUE`; inserts that collide
//!   are reported as [`InsertOutcome::Duplicate`] rather than as errors
//! - **Migrations**: SQL migrations are embedded and versioned using `SQLx`
//! - **Connection Pooling**: WAL journaling with a busy timeout for file databases
//!
//! # Example
//!
//! ```ignore
//! use harvest_db::{Database, RecordStore};
//!
//! let db = Database::new("harvest.db", 5).await?;
//! db.run_migrations().await?;
//! let outcome = db.insert(&record).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod error;
pub mod migrations;
pub mod records;
pub mod store;

// Re-export commonly used types
pub use connection::{ConnectionPool, IN_MEMORY};
pub use error::{DatabaseError, Result};
pub use records::{InsertOutcome, RecordPage, RecordQuery};
pub use store::RecordStore;

use std::path::Path;

/// High-level database interface with migrations.
///
/// This wraps a `ConnectionPool` and implements [`RecordStore`].
#[derive(Debug, Clone)]
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    /// Open a database at `path` (or `:memory:`).
    ///
    /// # Errors
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let pool = ConnectionPool::new(path, max_connections).await?;
        Ok(Self { pool })
    }

    /// Open a database and bring its schema up to date.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the database cannot be opened or migrated.
    pub async fn open(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let db = Self::new(path, max_connections).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Create a database instance from an existing pool.
    #[must_use]
    pub fn from_pool(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if migrations fail.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(self.pool.pool()).await
    }

    /// Get the current schema version.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the version cannot be queried.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(self.pool.pool()).await
    }

    /// Get a reference to the underlying `SQLx` pool.
    #[must_use]
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Sqlite> {
        self.pool.pool()
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}
