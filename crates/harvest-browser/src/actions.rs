use crate::error::{BrowserError, Result};
use serde::{Deserialize, Serialize};

/// Content type assumed when the rendered document does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// Transport details of the last navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationInfo {
    pub status_code: u16,
    pub content_type: String,
}

impl Default for NavigationInfo {
    fn default() -> Self {
        Self {
            status_code: 200,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

/// Operations on one exclusive browser session.
#[async_trait::async_trait]
pub trait BrowserActions: Send + Sync {
    /// Navigate to a URL and report the response status and content type
    async fn navigate(&self, url: &str) -> Result<NavigationInfo>;

    /// Current document title
    async fn title(&self) -> Result<Option<String>>;

    /// Fully rendered document markup
    async fn content(&self) -> Result<String>;

    /// Evaluate a script in the page and return its JSON result
    async fn evaluate_json(&self, script: &str) -> Result<serde_json::Value>;

    /// Extract text from the first element matching a CSS selector
    async fn extract_text(&self, selector: &str) -> Result<String>;

    /// Release the page and browser process. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

/// Starts isolated browser sessions, one per call.
#[async_trait::async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserActions>>;
}

/// Script returning the text of the first element matching `selector`, or
/// `null` when nothing matches.
pub fn text_query_script(selector: &str) -> Result<String> {
    let literal = serde_json::to_string(selector)
        .map_err(|e| BrowserError::EvaluationError(e.to_string()))?;
    Ok(format!(
        "(() => {{ const el = document.querySelector({literal}); \
         return el ? (el.innerText || el.textContent || '') : null; }})()"
    ))
}

/// Interpret the value returned by [`text_query_script`].
pub fn parse_text_result(selector: &str, value: serde_json::Value) -> Result<String> {
    match value {
        serde_json::Value::String(text) => Ok(text.trim().to_string()),
        serde_json::Value::Null => Err(BrowserError::SelectorNotFound(selector.to_string())),
        other => Ok(other.to_string()),
    }
}
