//! Schema for the record store, embedded from `migrations/`.

use crate::error::{DatabaseError, Result};
use sqlx::migrate::Migrator;
use sqlx::{Pool, Sqlite};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Version of the newest embedded migration.
#[must_use]
pub fn latest_version() -> i64 {
    MIGRATOR.iter().map(|m| m.version).max().unwrap_or(0)
}

/// Bring the `records` table and its fingerprint index up to date.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    tracing::debug!(version = latest_version(), "record schema ready");
    Ok(())
}

/// Highest successfully applied migration, 0 for an empty database.
pub async fn get_schema_version(pool: &Pool<Sqlite>) -> Result<i64> {
    let tracked: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master \
         WHERE type = 'table' AND name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;
    if !tracked {
        return Ok(0);
    }

    let version: Option<i64> =
        sqlx::query_scalar("SELECT MAX(version) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;
    Ok(version.unwrap_or(0))
}
