use harvest_core::{BrowserConfig, ScrapingConfig};

/// Identity presented by every browser session.
///
/// Sessions use one fixed user agent and viewport so rendered output is
/// comparable across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintConfig {
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl FingerprintConfig {
    /// Build the session identity from application settings.
    pub fn from_config(scraping: &ScrapingConfig, browser: &BrowserConfig) -> Self {
        Self {
            user_agent: scraping.user_agent.clone(),
            viewport_width: browser.viewport_width,
            viewport_height: browser.viewport_height,
        }
    }

    /// Chromium command-line arguments carrying this identity.
    pub fn launch_args(&self) -> Vec<String> {
        vec![
            format!("--user-agent={}", self.user_agent),
            format!(
                "--window-size={},{}",
                self.viewport_width, self.viewport_height
            ),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--no-first-run".to_string(),
        ]
    }
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self::from_config(&ScrapingConfig::default(), &BrowserConfig::default())
    }
}
