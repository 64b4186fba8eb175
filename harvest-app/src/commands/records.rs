//! Record browsing commands and the record response shape.

use crate::error::{CommandError, NOT_FOUND};
use crate::state::AppState;
use chrono::{DateTime, Utc};
use harvest_core::{QueryConfig, Record, RecordId};
use harvest_db::{RecordQuery, RecordStore};
use serde::{Deserialize, Serialize};

/// Characters of content kept in `contentPreview`.
pub const PREVIEW_CHARS: usize = 200;

/// Record as returned to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    pub id: String,
    pub url: String,
    pub title: String,
    pub content_preview: String,
    pub content: String,
    pub metadata: serde_json::Value,
    pub scraped_date: DateTime<Utc>,
    pub content_type: String,
    pub is_dynamic_content: bool,
    pub status_code: u16,
}

impl From<&Record> for RecordResponse {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id.to_string(),
            url: record.url.clone(),
            title: record.title.clone(),
            content_preview: content_preview(&record.content),
            content: record.content.clone(),
            metadata: serde_json::Value::Object(record.metadata.clone()),
            scraped_date: record.scraped_at,
            content_type: record.content_type.clone(),
            is_dynamic_content: record.is_dynamic,
            status_code: record.status_code,
        }
    }
}

/// First [`PREVIEW_CHARS`] characters, with `...` appended when cut.
#[must_use]
pub fn content_preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((end, _)) => format!("{}...", &content[..end]),
        None => content.to_string(),
    }
}

/// Caller-facing filters for listing and export.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordFilters {
    /// Substring of the URL
    pub url: Option<String>,
    /// Acquired at or after
    pub after: Option<DateTime<Utc>>,
    /// Acquired before
    pub before: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub is_dynamic: Option<bool>,
    /// 1-based page
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl RecordFilters {
    /// Build a store query, clamping the page size to `config`.
    #[must_use]
    pub fn to_query(&self, config: &QueryConfig) -> RecordQuery {
        let page_size = match self.page_size {
            None | Some(0) => config.default_page_size,
            Some(size) => size.min(config.max_page_size),
        };

        RecordQuery {
            page: self.page.unwrap_or(1).max(1),
            page_size,
            ..self.unpaged()
        }
    }

    /// Build a store query returning every match.
    #[must_use]
    pub fn unpaged(&self) -> RecordQuery {
        RecordQuery {
            url_contains: self.url.clone().filter(|u| !u.trim().is_empty()),
            scraped_after: self.after,
            scraped_before: self.before,
            content_type: self.content_type.clone(),
            is_dynamic: self.is_dynamic,
            page: 1,
            page_size: 0,
        }
    }
}

/// One page of shaped records.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordListResponse {
    pub items: Vec<RecordResponse>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

/// List stored records, newest first.
pub async fn list_records(
    state: &AppState,
    filters: &RecordFilters,
) -> Result<RecordListResponse, CommandError> {
    let query = filters.to_query(&state.config.query);
    let page = state.db.query(&query).await?;

    Ok(RecordListResponse {
        items: page.items.iter().map(RecordResponse::from).collect(),
        total: page.total,
        page: page.page,
        page_size: page.page_size,
    })
}

/// Fetch one record by id.
pub async fn get_record(state: &AppState, id: &str) -> Result<RecordResponse, CommandError> {
    let record_id = RecordId::new(id.trim())?;

    match state.db.find_by_id(&record_id).await? {
        Some(record) => Ok(RecordResponse::from(&record)),
        None => Err(not_found(&record_id)),
    }
}

/// Delete one record by id.
pub async fn delete_record(state: &AppState, id: &str) -> Result<(), CommandError> {
    let record_id = RecordId::new(id.trim())?;

    if state.db.delete(&record_id).await? {
        tracing::info!(record_id = %record_id, "Record deleted");
        Ok(())
    } else {
        Err(not_found(&record_id))
    }
}

fn not_found(id: &RecordId) -> CommandError {
    CommandError::with_details(
        NOT_FOUND,
        "Record not found",
        serde_json::json!({ "id": id.as_str() }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_content_is_not_truncated() {
        assert_eq!(content_preview("hello"), "hello");
        assert_eq!(content_preview(&"a".repeat(200)), "a".repeat(200));
    }

    #[test]
    fn test_long_content_is_truncated_on_char_boundary() {
        let content = "é".repeat(250);
        let preview = content_preview(&content);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 203);
    }

    #[test]
    fn test_page_size_clamped() {
        let config = QueryConfig::default();
        let filters = RecordFilters {
            page_size: Some(10_000),
            ..RecordFilters::default()
        };
        assert_eq!(filters.to_query(&config).page_size, config.max_page_size);

        let filters = RecordFilters::default();
        let query = filters.to_query(&config);
        assert_eq!(query.page_size, config.default_page_size);
        assert_eq!(query.page, 1);
    }

    #[test]
    fn test_filters_deserialize_camel_case() {
        let filters: RecordFilters = serde_json::from_value(serde_json::json!({
            "url": "example.com",
            "isDynamic": true,
            "pageSize": 5
        }))
        .expect("parse filters");

        let query = filters.unpaged();
        assert_eq!(query.url_contains.as_deref(), Some("example.com"));
        assert_eq!(query.is_dynamic, Some(true));
        assert_eq!(query.page_size, 0);
    }
}
