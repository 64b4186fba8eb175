//! Record persistence for acquired pages.
//!
//! This module provides the operations on the `records` table. The table
//! carries a `UNIQUE` constraint on `content_hash`, so the database is the
//! final arbiter when two scrapes of identical content race each other.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use harvest_core::{ContentHash, Metadata, Record, RecordId};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, QueryBuilder, Row, Sqlite};

const RECORD_COLUMNS: &str = "id, url, title, content, content_type, metadata, scraped_at, \
                              content_hash, is_dynamic, status_code";

/// Outcome of an insert attempt against the fingerprint constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was written.
    Inserted,
    /// A record with the same fingerprint already existed; nothing was written.
    Duplicate,
}

/// Filters and paging for record listings.
///
/// All filters are optional and combined with `AND`. Pages are 1-based.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordQuery {
    /// Substring match on the URL, ASCII case-insensitive (`LIKE`)
    pub url_contains: Option<String>,
    /// Only records acquired at or after this instant
    pub scraped_after: Option<DateTime<Utc>>,
    /// Only records acquired strictly before this instant
    pub scraped_before: Option<DateTime<Utc>>,
    /// Exact content type match
    pub content_type: Option<String>,
    /// Only records produced by (or not by) dynamic rendering
    pub is_dynamic: Option<bool>,
    /// 1-based page number (0 is treated as 1)
    pub page: u32,
    /// Records per page (0 selects all matching records)
    pub page_size: u32,
}

impl RecordQuery {
    fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * i64::from(self.page_size)
    }
}

/// One page of records, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPage {
    /// Records on this page
    pub items: Vec<Record>,
    /// Total number of records matching the filters
    pub total: i64,
    /// Page number that was served
    pub page: u32,
    /// Page size that was applied
    pub page_size: u32,
}

/// Format a timestamp so lexical order matches chronological order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_record_row(row: &SqliteRow) -> Result<Record> {
    let id: String = row.try_get("id")?;
    let metadata_json: String = row.try_get("metadata")?;
    let scraped_at: String = row.try_get("scraped_at")?;
    let content_hash: String = row.try_get("content_hash")?;
    let status_code: i64 = row.try_get("status_code")?;

    let metadata: Metadata = serde_json::from_str(&metadata_json)
        .map_err(|e| DatabaseError::SerializationError(format!("metadata for {id}: {e}")))?;

    Ok(Record {
        id: RecordId::new(&id).map_err(|e| DatabaseError::Decode(e.to_string()))?,
        url: row.try_get("url")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        content_type: row.try_get("content_type")?,
        metadata,
        scraped_at: DateTime::parse_from_rfc3339(&scraped_at)
            .map_err(|e| DatabaseError::Decode(format!("scraped_at for {id}: {e}")))?
            .with_timezone(&Utc),
        content_hash: ContentHash::from_hex(content_hash),
        is_dynamic: row.try_get("is_dynamic")?,
        status_code: u16::try_from(status_code)
            .map_err(|_| DatabaseError::Decode(format!("status_code {status_code} for {id}")))?,
    })
}

fn parse_records_from_rows(rows: &[SqliteRow]) -> Result<Vec<Record>> {
    rows.iter().map(parse_record_row).collect()
}

/// Escape `LIKE` wildcards so the needle matches literally.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &RecordQuery) {
    builder.push(" WHERE 1 = 1");

    if let Some(needle) = &query.url_contains {
        builder
            .push(" AND url LIKE ")
            .push_bind(like_pattern(needle))
            .push(" ESCAPE '\\'");
    }
    if let Some(after) = &query.scraped_after {
        builder
            .push(" AND scraped_at >= ")
            .push_bind(format_timestamp(after));
    }
    if let Some(before) = &query.scraped_before {
        builder
            .push(" AND scraped_at < ")
            .push_bind(format_timestamp(before));
    }
    if let Some(content_type) = &query.content_type {
        builder
            .push(" AND content_type = ")
            .push_bind(content_type.clone());
    }
    if let Some(is_dynamic) = query.is_dynamic {
        builder.push(" AND is_dynamic = ").push_bind(is_dynamic);
    }
}

/// Look up the record carrying a fingerprint, if any.
///
/// # Errors
/// Returns `DatabaseError` if the query fails or the stored row is malformed.
pub async fn find_by_hash(pool: &Pool<Sqlite>, hash: &ContentHash) -> Result<Option<Record>> {
    let row = sqlx::query(&format!(
        "SELECT {RECORD_COLUMNS} FROM records WHERE content_hash = ?"
    ))
    .bind(hash.as_str())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(parse_record_row).transpose()
}

/// Insert a record unless its fingerprint is already stored.
///
/// # Errors
/// Returns `DatabaseError` if metadata cannot be serialized or the insert
/// fails for a reason other than the fingerprint constraint.
pub async fn insert_record(pool: &Pool<Sqlite>, record: &Record) -> Result<InsertOutcome> {
    let metadata_json = serde_json::to_string(&record.metadata)
        .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

    let result = sqlx::query(&format!(
        "INSERT INTO records ({RECORD_COLUMNS})
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(content_hash) DO NOTHING"
    ))
    .bind(record.id.as_str())
    .bind(&record.url)
    .bind(&record.title)
    .bind(&record.content)
    .bind(&record.content_type)
    .bind(&metadata_json)
    .bind(format_timestamp(&record.scraped_at))
    .bind(record.content_hash.as_str())
    .bind(record.is_dynamic)
    .bind(i64::from(record.status_code))
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        tracing::debug!(hash = %record.content_hash, "record fingerprint already stored");
        Ok(InsertOutcome::Duplicate)
    } else {
        tracing::debug!(id = %record.id, url = %record.url, "record inserted");
        Ok(InsertOutcome::Inserted)
    }
}

/// Fetch a record by its identifier.
///
/// # Errors
/// Returns `DatabaseError` if the query fails or the stored row is malformed.
pub async fn find_by_id(pool: &Pool<Sqlite>, id: &RecordId) -> Result<Option<Record>> {
    let row = sqlx::query(&format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?"))
        .bind(id.as_str())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(parse_record_row).transpose()
}

/// Delete a record by its identifier.
///
/// Returns `true` if a record was removed.
///
/// # Errors
/// Returns `DatabaseError` if the delete fails.
pub async fn delete_record(pool: &Pool<Sqlite>, id: &RecordId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM records WHERE id = ?")
        .bind(id.as_str())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Count records matching the query's filters (paging is ignored).
///
/// # Errors
/// Returns `DatabaseError` if the query fails.
pub async fn count_records(pool: &Pool<Sqlite>, query: &RecordQuery) -> Result<i64> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM records");
    push_filters(&mut builder, query);

    let count: i64 = builder.build_query_scalar().fetch_one(pool).await?;
    Ok(count)
}

/// List records matching the query, newest first.
///
/// # Errors
/// Returns `DatabaseError` if the query fails or a stored row is malformed.
pub async fn query_records(pool: &Pool<Sqlite>, query: &RecordQuery) -> Result<RecordPage> {
    let total = count_records(pool, query).await?;

    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {RECORD_COLUMNS} FROM records"));
    push_filters(&mut builder, query);
    builder.push(" ORDER BY scraped_at DESC, rowid DESC");
    if query.page_size > 0 {
        builder
            .push(" LIMIT ")
            .push_bind(i64::from(query.page_size))
            .push(" OFFSET ")
            .push_bind(query.offset());
    }

    let rows = builder.build().fetch_all(pool).await?;

    Ok(RecordPage {
        items: parse_records_from_rows(&rows)?,
        total,
        page: query.page.max(1),
        page_size: query.page_size,
    })
}
