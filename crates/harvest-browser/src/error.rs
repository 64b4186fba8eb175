use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("browser launch failed: {0}")]
    LaunchError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    #[error("script evaluation failed: {0}")]
    EvaluationError(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("browser session already closed")]
    SessionClosed,
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Self::ChromiumError(err.to_string())
    }
}

impl From<BrowserError> for harvest_core::HarvestError {
    fn from(err: BrowserError) -> Self {
        Self::Browser(err.to_string())
    }
}
