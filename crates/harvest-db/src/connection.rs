//! Database connection management.
//!
//! Provides a `ConnectionPool` wrapper around `SQLx` that configures
//! `SQLite` for several concurrent writers: WAL journaling and a busy timeout
//! so inserts racing on the same fingerprint queue up instead of failing.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Path that selects a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// `SQLite` connection pool for the record store.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    pool: Pool<Sqlite>,
}

impl ConnectionPool {
    /// Open (creating if needed) a database and its connection pool.
    ///
    /// # Arguments
    /// * `path` - Path to the `SQLite` database file (or `:memory:` for in-memory)
    /// * `max_connections` - Upper bound on pooled connections
    ///
    /// # Errors
    /// Returns `DatabaseError` if:
    /// - The path is not valid UTF-8
    /// - The parent directory cannot be created
    /// - The database file cannot be opened
    pub async fn new(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_str().ok_or_else(|| {
            DatabaseError::Open("invalid database path: not valid UTF-8".to_string())
        })?;

        let connect_options = if path_str == IN_MEMORY {
            SqliteConnectOptions::from_str(path_str)
                .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            SqliteConnectOptions::new()
                .filename(path)
                .journal_mode(SqliteJournalMode::Wal)
                .create_if_missing(true)
        }
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(connect_options)
            .await
            .map_err(|e| DatabaseError::Open(format!("failed to initialize pool: {e}")))?;

        tracing::info!("Database pool created at {}", path_str);

        Ok(Self { pool })
    }

    /// Wrap an existing `SQLx` pool.
    #[must_use]
    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying `SQLx` pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the connection pool gracefully.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }

    /// Check that the database answers queries.
    ///
    /// # Errors
    /// Returns `DatabaseError::Sqlx` if the database cannot be queried.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_in_memory_pool_creation() {
        let pool = ConnectionPool::new(IN_MEMORY, 5)
            .await
            .expect("create pool");

        pool.ping().await.expect("ping database");
    }

    #[tokio::test]
    async fn test_file_pool_creates_parent_dirs() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("nested").join("harvest.db");

        let pool = ConnectionPool::new(&path, 2).await.expect("create pool");
        pool.ping().await.expect("ping database");
        assert!(path.exists());

        pool.close().await;
    }
}
