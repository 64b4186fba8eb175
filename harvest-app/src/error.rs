//! Error types for app commands.

use harvest_core::HarvestError;
use harvest_db::DatabaseError;
use harvest_scheduler::QueueError;
use harvest_scraper::ScrapeError;
use serde::Serialize;
use std::fmt;

/// Malformed request body or parameter.
pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
/// Every URL in the request was blank or malformed.
pub const NO_VALID_URLS: &str = "NO_VALID_URLS";
/// Export format other than json, jsonl or csv.
pub const UNSUPPORTED_FORMAT: &str = "UNSUPPORTED_FORMAT";
/// Record or job does not exist.
pub const NOT_FOUND: &str = "NOT_FOUND";
/// Record store failure.
pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
/// Job queue refused the work.
pub const QUEUE_ERROR: &str = "QUEUE_ERROR";
/// Anything else.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// Serializable error returned by every command.
#[derive(Debug, Serialize)]
pub struct CommandError {
    /// Error code for callers (e.g., "NO_VALID_URLS")
    pub code: String,
    /// User-friendly error message
    pub message: String,
    /// Optional debugging context
    pub details: Option<serde_json::Value>,
}

impl CommandError {
    /// Create a new command error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Create a command error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details),
        }
    }

    /// Shorthand for an `INVALID_REQUEST` error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, message)
    }

    /// Whether the request was rejected before any work began.
    ///
    /// Everything else is a failure of the orchestration or storage layer.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.code.as_str(),
            INVALID_REQUEST | NO_VALID_URLS | UNSUPPORTED_FORMAT | NOT_FOUND
        )
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CommandError {}

impl From<ScrapeError> for CommandError {
    fn from(err: ScrapeError) -> Self {
        match err {
            ScrapeError::NoValidUrls => Self::new(NO_VALID_URLS, "No valid URLs provided"),
            ScrapeError::TooManyUrls { count, max } => Self::with_details(
                INVALID_REQUEST,
                format!("Too many URLs: {count} provided, at most {max} allowed"),
                serde_json::json!({ "count": count, "max": max }),
            ),
            ScrapeError::Validation(msg) => Self::invalid(msg),
            ScrapeError::Storage(err) => err.into(),
            ScrapeError::Client(msg) => {
                Self::new(INTERNAL_ERROR, format!("HTTP client error: {msg}"))
            }
            ScrapeError::Internal(msg) => Self::new(INTERNAL_ERROR, msg),
        }
    }
}

impl From<DatabaseError> for CommandError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound => Self::new(NOT_FOUND, "Record not found"),
            DatabaseError::NotFoundWithMessage(msg) => Self::new(NOT_FOUND, msg),
            other => Self::new(STORAGE_ERROR, format!("Storage error: {other}")),
        }
    }
}

impl From<QueueError> for CommandError {
    fn from(err: QueueError) -> Self {
        Self::new(QUEUE_ERROR, format!("Queue error: {err}"))
    }
}

impl From<HarvestError> for CommandError {
    fn from(err: HarvestError) -> Self {
        match err {
            HarvestError::Validation(msg) => Self::invalid(msg),
            HarvestError::Storage(msg) => Self::new(STORAGE_ERROR, msg),
            HarvestError::Queue(msg) => Self::new(QUEUE_ERROR, msg),
            other => Self::new(INTERNAL_ERROR, other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid(format!("Malformed JSON: {err}"))
    }
}

impl From<csv::Error> for CommandError {
    fn from(err: csv::Error) -> Self {
        Self::new(INTERNAL_ERROR, format!("CSV error: {err}"))
    }
}

/// Convert `std::io::Error` to `CommandError`.
impl From<std::io::Error> for CommandError {
    fn from(err: std::io::Error) -> Self {
        Self::new(INTERNAL_ERROR, format!("Filesystem error: {err}"))
    }
}
