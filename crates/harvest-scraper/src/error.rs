use harvest_core::HarvestError;
use thiserror::Error;

/// Errors that reach the caller of the pipeline.
///
/// Acquisition failures are not represented here; they become degraded
/// records. What is left is request validation and storage.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("no valid URLs provided")]
    NoValidUrls,

    #[error("too many URLs: {count} provided, at most {max} allowed")]
    TooManyUrls { count: usize, max: usize },

    #[error("storage error: {0}")]
    Storage(#[from] harvest_db::DatabaseError),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

impl From<HarvestError> for ScrapeError {
    fn from(err: HarvestError) -> Self {
        match err {
            HarvestError::Validation(msg) => Self::Validation(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl ScrapeError {
    /// True for errors that reject the request before any acquisition.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NoValidUrls | Self::TooManyUrls { .. }
        )
    }
}
