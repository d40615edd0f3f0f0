//! Headless browser rendering
//!
//! Last-resort fetcher for pages that only produce their metadata after
//! script execution. Each attempt launches a fresh Chromium, navigates,
//! waits a fixed settle delay and reads back the rendered DOM.
//!
//! The browser lives inside a [`BrowserSession`] guard: the normal path
//! closes it explicitly, and dropping the guard on any early exit schedules
//! the close on the runtime, so the child process never outlives the call.

use bookmark_manager_core::ScrapeError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::http::CHROME_USER_AGENT;

/// Configuration for the headless fetcher
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Upper bound for navigation in seconds
    pub navigation_timeout_secs: u64,
    /// Pause after navigation so scripts can populate the DOM
    pub settle_delay_secs: u64,
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Explicit browser binary; auto-detected when `None`
    pub executable: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_secs: 30,
            settle_delay_secs: 5,
            max_attempts: 2,
            executable: None,
            user_agent: CHROME_USER_AGENT.to_string(),
        }
    }
}

/// Renders pages in a headless browser
#[derive(Debug, Clone, Default)]
pub struct HeadlessFetcher {
    config: HeadlessConfig,
}

impl HeadlessFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HeadlessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HeadlessConfig {
        &self.config
    }

    /// Rendered HTML of `url`, retrying launch and navigation failures
    pub async fn fetch_html(&self, url: &str) -> Result<String, ScrapeError> {
        let attempts = self.config.max_attempts.max(1);
        let mut last_error = ScrapeError::Browser {
            details: "no attempt made".to_string(),
        };

        for attempt in 1..=attempts {
            match self.render(url).await {
                Ok(html) => {
                    info!("Headless render of {} succeeded on attempt {}", url, attempt);
                    return Ok(html);
                }
                Err(e) => {
                    warn!("Headless attempt {}/{} for {} failed: {}", attempt, attempts, url, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    #[cfg(feature = "headless")]
    async fn render(&self, url: &str) -> Result<String, ScrapeError> {
        let session = session::BrowserSession::launch(&self.config).await?;
        let result = session.render(url, &self.config).await;
        session.close().await;
        result
    }

    #[cfg(not(feature = "headless"))]
    async fn render(&self, url: &str) -> Result<String, ScrapeError> {
        debug!("Headless support not compiled in, skipping {}", url);
        Err(ScrapeError::Browser {
            details: "headless browser support is disabled".to_string(),
        })
    }
}

#[cfg(feature = "headless")]
mod session {
    use super::*;
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use futures_util::StreamExt;
    use tokio::task::JoinHandle;

    const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

    fn browser_error(e: impl std::fmt::Display) -> ScrapeError {
        ScrapeError::Browser { details: e.to_string() }
    }

    /// Owns a launched browser and the task driving its CDP connection
    pub(super) struct BrowserSession {
        browser: Option<Browser>,
        handler: Option<JoinHandle<()>>,
        runtime: tokio::runtime::Handle,
    }

    impl BrowserSession {
        pub(super) async fn launch(config: &HeadlessConfig) -> Result<Self, ScrapeError> {
            let mut builder = BrowserConfig::builder()
                .no_sandbox()
                .request_timeout(Duration::from_secs(config.navigation_timeout_secs))
                .arg("--disable-gpu")
                .arg("--disable-dev-shm-usage")
                .arg("--disable-blink-features=AutomationControlled")
                .arg(format!("--user-agent={}", config.user_agent));
            if let Some(executable) = &config.executable {
                builder = builder.chrome_executable(executable);
            }
            let browser_config = builder.build().map_err(browser_error)?;

            let (browser, mut handler) = Browser::launch(browser_config).await.map_err(browser_error)?;
            let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });
            debug!("Headless browser launched");

            Ok(Self {
                browser: Some(browser),
                handler: Some(handler),
                runtime: tokio::runtime::Handle::current(),
            })
        }

        pub(super) async fn render(&self, url: &str, config: &HeadlessConfig) -> Result<String, ScrapeError> {
            let browser = self.browser.as_ref().ok_or_else(|| browser_error("browser already closed"))?;
            let page = browser.new_page("about:blank").await.map_err(browser_error)?;

            let navigation = async {
                page.goto(url).await?;
                page.wait_for_navigation().await?;
                Ok::<_, chromiumoxide::error::CdpError>(())
            };
            let navigated = tokio::time::timeout(Duration::from_secs(config.navigation_timeout_secs), navigation).await;

            let result = match navigated {
                Err(_) => Err(ScrapeError::Timeout { url: url.to_string() }),
                Ok(Err(e)) => Err(browser_error(e)),
                Ok(Ok(())) => {
                    tokio::time::sleep(Duration::from_secs(config.settle_delay_secs)).await;
                    page.content().await.map_err(browser_error)
                }
            };

            if let Err(e) = page.close().await {
                debug!("Failed to close page for {}: {}", url, e);
            }
            result
        }

        /// Close the browser and reap the child process
        pub(super) async fn close(mut self) {
            if let Some(browser) = self.browser.take() {
                shutdown(browser).await;
            }
            if let Some(handler) = self.handler.take() {
                handler.abort();
            }
        }
    }

    async fn shutdown(mut browser: Browser) {
        if let Err(e) = browser.close().await {
            debug!("Browser close command failed: {}", e);
        }
        match tokio::time::timeout(CLOSE_TIMEOUT, browser.wait()).await {
            Ok(Ok(_)) => debug!("Headless browser exited"),
            _ => {
                if let Some(Err(e)) = browser.kill().await {
                    warn!("Failed to kill headless browser: {}", e);
                }
            }
        }
    }

    impl Drop for BrowserSession {
        fn drop(&mut self) {
            let browser = self.browser.take();
            let handler = self.handler.take();
            if browser.is_none() && handler.is_none() {
                return;
            }

            self.runtime.spawn(async move {
                if let Some(browser) = browser {
                    shutdown(browser).await;
                }
                if let Some(handler) = handler {
                    handler.abort();
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bounds() {
        let config = HeadlessConfig::default();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.settle_delay_secs, 5);
        assert_eq!(config.navigation_timeout_secs, 30);
    }

    #[tokio::test]
    async fn test_missing_browser_yields_error_after_bounded_attempts() {
        let fetcher = HeadlessFetcher::with_config(HeadlessConfig {
            executable: Some(PathBuf::from("/nonexistent/chromium-binary")),
            navigation_timeout_secs: 2,
            settle_delay_secs: 0,
            ..Default::default()
        });

        let result = fetcher.fetch_html("http://127.0.0.1:9/").await;
        assert!(matches!(result, Err(ScrapeError::Browser { .. }) | Err(ScrapeError::Timeout { .. })));
    }
}
