//! Record export in JSON, JSON Lines or CSV.

use crate::commands::records::RecordFilters;
use crate::error::{CommandError, INTERNAL_ERROR, UNSUPPORTED_FORMAT};
use crate::state::AppState;
use chrono::{DateTime, Utc};
use harvest_core::Record;
use harvest_db::RecordStore;
use serde::Serialize;
use std::str::FromStr;

/// Column order of CSV exports.
pub const CSV_HEADER: [&str; 9] = [
    "id",
    "url",
    "title",
    "contentType",
    "scrapedDate",
    "isDynamicContent",
    "statusCode",
    "contentHash",
    "content",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Pretty-printed JSON array
    Json,
    /// One JSON object per line
    Jsonl,
    /// RFC 4180 CSV with a header row
    Csv,
}

impl FromStr for ExportFormat {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "jsonl" | "ndjson" => Ok(Self::Jsonl),
            "csv" => Ok(Self::Csv),
            other => Err(CommandError::with_details(
                UNSUPPORTED_FORMAT,
                format!("Unsupported export format '{other}'"),
                serde_json::json!({ "supported": ["json", "jsonl", "csv"] }),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportRecord<'a> {
    id: &'a str,
    url: &'a str,
    title: &'a str,
    content_type: &'a str,
    scraped_date: DateTime<Utc>,
    is_dynamic_content: bool,
    status_code: u16,
    content_hash: &'a str,
    content: &'a str,
    metadata: &'a harvest_core::Metadata,
}

impl<'a> From<&'a Record> for ExportRecord<'a> {
    fn from(record: &'a Record) -> Self {
        Self {
            id: record.id.as_str(),
            url: &record.url,
            title: &record.title,
            content_type: &record.content_type,
            scraped_date: record.scraped_at,
            is_dynamic_content: record.is_dynamic,
            status_code: record.status_code,
            content_hash: record.content_hash.as_str(),
            content: &record.content,
            metadata: &record.metadata,
        }
    }
}

/// Export every record matching `filters` in `format`.
///
/// Paging fields in `filters` are ignored.
pub async fn export_records(
    state: &AppState,
    format: &str,
    filters: &RecordFilters,
) -> Result<String, CommandError> {
    let format: ExportFormat = format.parse()?;
    let page = state.db.query(&filters.unpaged()).await?;
    tracing::info!(records = page.items.len(), ?format, "Exporting records");
    render(format, &page.items)
}

/// Render records in the given format.
pub fn render(format: ExportFormat, records: &[Record]) -> Result<String, CommandError> {
    let rows: Vec<ExportRecord<'_>> = records.iter().map(ExportRecord::from).collect();

    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(&rows)?),
        ExportFormat::Jsonl => {
            let mut out = String::new();
            for row in &rows {
                out.push_str(&serde_json::to_string(row)?);
                out.push('\n');
            }
            Ok(out)
        }
        ExportFormat::Csv => render_csv(&rows),
    }
}

fn render_csv(rows: &[ExportRecord<'_>]) -> Result<String, CommandError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for row in rows {
        let scraped = row.scraped_date.to_rfc3339();
        let status = row.status_code.to_string();
        writer.write_record([
            row.id,
            row.url,
            row.title,
            row.content_type,
            scraped.as_str(),
            if row.is_dynamic_content { "true" } else { "false" },
            status.as_str(),
            row.content_hash,
            row.content,
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CommandError::new(INTERNAL_ERROR, format!("CSV flush failed: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| CommandError::new(INTERNAL_ERROR, format!("CSV is not UTF-8: {e}")))
}
