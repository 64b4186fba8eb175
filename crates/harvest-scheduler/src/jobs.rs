//! Job type definitions.

use chrono::{DateTime, Utc};
use harvest_core::ScrapeRequest;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque job identifier handed back by `enqueue`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One deferred acquisition.
#[derive(Debug, Clone)]
pub struct ScrapeJob {
    pub request: ScrapeRequest,
}

impl ScrapeJob {
    pub fn new(request: ScrapeRequest) -> Self {
        Self { request }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum JobStatus {
    Queued,
    Running,
    #[serde(rename_all = "camelCase")]
    Completed { record_id: String },
    Failed { error: String },
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub id: JobId,
    pub url: String,
    pub status: JobStatus,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobInfo {
    pub fn queued(id: JobId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            status: JobStatus::Queued,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}
