use crate::actions::{
    parse_text_result, text_query_script, BrowserActions, NavigationInfo, SessionLauncher,
    DEFAULT_CONTENT_TYPE,
};
use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use harvest_core::AppConfig;
use serde::Deserialize;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Bound on each step of closing a browser before it is killed.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

const NAVIGATION_INFO_SCRIPT: &str = "(() => { \
    const nav = performance.getEntriesByType('navigation')[0]; \
    return { status: nav && nav.responseStatus ? nav.responseStatus : null, \
             contentType: document.contentType || null }; })()";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNavigation {
    status: Option<u16>,
    content_type: Option<String>,
}

impl From<RawNavigation> for NavigationInfo {
    fn from(raw: RawNavigation) -> Self {
        let defaults = NavigationInfo::default();
        Self {
            status_code: raw.status.unwrap_or(defaults.status_code),
            content_type: raw
                .content_type
                .filter(|ct| !ct.is_empty())
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        }
    }
}

/// Launches a fresh Chromium process for every session.
///
/// Sessions are never pooled: each caller owns its browser for the whole
/// navigation and must [`BrowserActions::close`] it.
#[derive(Debug, Clone)]
pub struct BrowserEngine {
    fingerprint: FingerprintConfig,
    headless: bool,
    no_sandbox: bool,
    executable: Option<PathBuf>,
    launch_timeout: Duration,
    navigation_timeout: Duration,
}

impl BrowserEngine {
    /// Create an engine using the browser and scraping sections of `config`
    pub fn new(config: &AppConfig) -> Self {
        Self {
            fingerprint: FingerprintConfig::from_config(&config.scraping, &config.browser),
            headless: config.browser.headless,
            no_sandbox: config.browser.no_sandbox,
            executable: config.browser.executable.clone(),
            launch_timeout: Duration::from_secs(config.browser.launch_timeout_secs),
            navigation_timeout: Duration::from_secs(config.browser.navigation_timeout_secs),
        }
    }

    /// Replace the session identity
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: FingerprintConfig) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    pub fn fingerprint(&self) -> &FingerprintConfig {
        &self.fingerprint
    }

    fn chrome_config(&self) -> Result<ChromeConfig> {
        let mut builder = ChromeConfig::builder()
            .viewport(Some(Viewport {
                width: self.fingerprint.viewport_width,
                height: self.fingerprint.viewport_height,
                device_scale_factor: Some(1.0),
                ..Default::default()
            }))
            .window_size(self.fingerprint.viewport_width, self.fingerprint.viewport_height)
            .launch_timeout(self.launch_timeout)
            .args(self.fingerprint.launch_args());

        if !self.headless {
            builder = builder.with_head();
        }
        if self.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(executable) = &self.executable {
            builder = builder.chrome_executable(executable);
        }

        builder.build().map_err(BrowserError::LaunchError)
    }

    /// Launch a browser process with one blank page
    pub async fn launch_session(&self) -> Result<BrowserSession> {
        let config = self.chrome_config()?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::LaunchError(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("browser handler event error: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    tracing::warn!("failed to close browser after page error: {}", close_err);
                }
                handler_task.abort();
                return Err(e.into());
            }
        };

        tracing::debug!("browser session launched");

        Ok(BrowserSession {
            browser: Some(browser),
            page: Some(page),
            handler: Some(handler_task),
            navigation_timeout: self.navigation_timeout,
        })
    }
}

#[async_trait::async_trait]
impl SessionLauncher for BrowserEngine {
    async fn launch(&self) -> Result<Box<dyn BrowserActions>> {
        Ok(Box::new(self.launch_session().await?))
    }
}

/// One browser process, its event loop and a single page.
///
/// [`BrowserActions::close`] is the normal teardown. Dropping an unclosed
/// session stops the event loop and lets chromiumoxide kill the process.
pub struct BrowserSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    navigation_timeout: Duration,
}

impl BrowserSession {
    fn page(&self) -> Result<&Page> {
        self.page.as_ref().ok_or(BrowserError::SessionClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.browser.is_none()
    }
}

#[async_trait::async_trait]
impl BrowserActions for BrowserSession {
    async fn navigate(&self, url: &str) -> Result<NavigationInfo> {
        let page = self.page()?;

        tokio::time::timeout(self.navigation_timeout, page.goto(url))
            .await
            .map_err(|_| {
                BrowserError::Timeout(format!(
                    "navigation to {url} exceeded {}s",
                    self.navigation_timeout.as_secs()
                ))
            })?
            .map_err(|e| BrowserError::NavigationError(e.to_string()))?;

        // A document that blocks script evaluation still navigated; fall back.
        match self.evaluate_json(NAVIGATION_INFO_SCRIPT).await {
            Ok(value) => Ok(serde_json::from_value::<RawNavigation>(value)
                .map(NavigationInfo::from)
                .unwrap_or_default()),
            Err(e) => {
                tracing::debug!("navigation info unavailable for {}: {}", url, e);
                Ok(NavigationInfo::default())
            }
        }
    }

    async fn title(&self) -> Result<Option<String>> {
        Ok(self.page()?.get_title().await?)
    }

    async fn content(&self) -> Result<String> {
        Ok(self.page()?.content().await?)
    }

    async fn evaluate_json(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::EvaluationError(e.to_string()))?;

        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn extract_text(&self, selector: &str) -> Result<String> {
        let script = text_query_script(selector)?;
        let value = self.evaluate_json(&script).await?;
        parse_text_result(selector, value)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::warn!("failed to close page: {}", e);
            }
        }

        let mut result = Ok(());
        if let Some(mut browser) = self.browser.take() {
            let mut exited = false;
            match within(CLOSE_TIMEOUT, browser.close()).await {
                Some(Ok(_)) => match within(CLOSE_TIMEOUT, browser.wait()).await {
                    Some(Ok(_)) => exited = true,
                    Some(Err(e)) => tracing::warn!("failed waiting for browser exit: {}", e),
                    None => tracing::warn!("browser did not exit within {:?}", CLOSE_TIMEOUT),
                },
                Some(Err(e)) => {
                    tracing::warn!("failed to close browser: {}", e);
                    result = Err(e.into());
                }
                None => tracing::warn!("browser close timed out after {:?}", CLOSE_TIMEOUT),
            }

            if !exited {
                force_kill(&mut browser).await;
            }
        }

        if let Some(handler) = self.handler.take() {
            handler.abort();
        }

        tracing::debug!("browser session closed");
        result
    }
}

/// Await `fut`, giving up after `limit`.
async fn within<F: Future>(limit: Duration, fut: F) -> Option<F::Output> {
    tokio::time::timeout(limit, fut).await.ok()
}

/// Kill the browser process and reap it so no Chromium outlives its session.
async fn force_kill(browser: &mut Browser) {
    match browser.kill().await {
        Some(Ok(())) => tracing::debug!("browser process killed"),
        Some(Err(e)) => tracing::warn!("failed to kill browser process: {}", e),
        None => {}
    }
    if within(CLOSE_TIMEOUT, browser.wait()).await.is_none() {
        tracing::warn!("killed browser was not reaped within {:?}", CLOSE_TIMEOUT);
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        if self.browser.is_some() {
            tracing::warn!("browser session dropped without close");
        }
    }
}
