//! Shared browser-automation session (Chrome DevTools Protocol)
//!
//! The browser is expensive to launch, so one engine is shared by every
//! request that needs it. Initialization is lazy and race-safe: the first
//! caller holding the session lock launches Chrome, later callers reuse it.
//! Page operations run while holding the same lock, so an explicit
//! [`BrowserSession::close`] is serialized behind completion of any
//! in-flight browser fetch instead of pulling the engine out from under it.

use std::time::{Duration, Instant};

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::fetchers::{PageRequest, RawPage};
use crate::DEFAULT_USER_AGENT;

/// Extra settle time after navigation for late-loading scripts
const RENDER_SETTLE: Duration = Duration::from_millis(500);

/// Poll interval while waiting for a selector
const SELECTOR_POLL: Duration = Duration::from_millis(250);

/// Default bound on a selector wait when the caller gives none
const DEFAULT_SELECTOR_WAIT: Duration = Duration::from_secs(10);

/// Chrome executable locations checked before falling back to `$PATH`
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];

struct BrowserHandle {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

/// Lazily launched, explicitly closable shared browser engine.
///
/// Constructor-injected wherever it is used; there is no process-global
/// instance.
pub struct BrowserSession {
    inner: Mutex<Option<BrowserHandle>>,
}

impl Default for BrowserSession {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserSession {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Fetch a page through the browser, launching the engine on first use.
    ///
    /// Navigation, the optional selector wait, and the optional scroll all
    /// happen on a fresh page that is closed before returning, so tabs do
    /// not accumulate across requests.
    pub async fn fetch_page(&self, request: &PageRequest) -> Result<RawPage, FetchError> {
        let mut guard = self.inner.lock().await;
        if guard.is_none() {
            *guard = Some(Self::launch(request.proxy.as_deref()).await?);
        }
        let handle = match guard.as_ref() {
            Some(handle) => handle,
            None => return Err(FetchError::Browser("browser failed to launch".into())),
        };

        let page = handle
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Browser(format!("failed to open page: {e}")))?;

        let result = Self::drive_page(&page, request).await;

        if let Err(err) = page.close().await {
            debug!(error = %err, "failed to close page");
        }
        result
    }

    async fn drive_page(page: &Page, request: &PageRequest) -> Result<RawPage, FetchError> {
        page.goto(request.url.as_str())
            .await
            .map_err(|e| FetchError::Browser(format!("navigation failed: {e}")))?;
        if let Err(err) = page.wait_for_navigation().await {
            debug!(error = %err, "navigation wait ended early");
        }
        tokio::time::sleep(RENDER_SETTLE).await;

        if let Some(selector) = request.wait_for_selector.as_deref() {
            let wait = request
                .wait_for_timeout
                .unwrap_or(DEFAULT_SELECTOR_WAIT);
            Self::wait_for_selector(page, selector, wait).await;
        }

        if request.scroll_to_bottom {
            Self::scroll_to_bottom(page).await;
        }

        if request.save_cookies {
            match page.get_cookies().await {
                Ok(cookies) => debug!(count = cookies.len(), "session cookies retained"),
                Err(err) => warn!(error = %err, "failed to read session cookies"),
            }
        }

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .map(|u| u.to_string())
            .unwrap_or_else(|| request.url.clone());

        let body = page
            .content()
            .await
            .map_err(|e| FetchError::Browser(format!("failed to read page content: {e}")))?;

        Ok(RawPage {
            url: request.url.clone(),
            final_url,
            // CDP does not surface the navigation status code directly
            status: 200,
            content_type: Some("text/html".to_string()),
            body,
            truncated: false,
        })
    }

    /// Poll for a selector until it appears or the bound elapses; a missing
    /// selector is logged, not fatal.
    async fn wait_for_selector(page: &Page, selector: &str, wait: Duration) {
        let deadline = Instant::now() + wait;
        loop {
            if page.find_element(selector).await.is_ok() {
                debug!(selector, "selector found");
                return;
            }
            if Instant::now() >= deadline {
                warn!(selector, "timed out waiting for selector");
                return;
            }
            tokio::time::sleep(SELECTOR_POLL).await;
        }
    }

    /// Scroll in steps so lazy-loaded content below the fold renders
    async fn scroll_to_bottom(page: &Page) {
        for _ in 0..3 {
            if let Err(err) = page
                .evaluate("window.scrollTo(0, document.body.scrollHeight)")
                .await
            {
                debug!(error = %err, "scroll step failed");
                return;
            }
            tokio::time::sleep(RENDER_SETTLE).await;
        }
    }

    async fn launch(proxy: Option<&str>) -> Result<BrowserHandle, FetchError> {
        let chrome = Self::find_chrome().await?;
        info!(chrome = %chrome, "launching browser");

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&chrome)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg(format!("--user-agent={DEFAULT_USER_AGENT}"));

        if let Some(proxy) = proxy {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }

        let config = builder
            .build()
            .map_err(|e| FetchError::Browser(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::Browser(format!("failed to launch browser: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(BrowserHandle {
            browser,
            handler_task,
        })
    }

    async fn find_chrome() -> Result<String, FetchError> {
        for path in CHROME_PATHS {
            if std::path::Path::new(path).exists() {
                return Ok((*path).to_string());
            }
        }
        for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
            if let Ok(output) = tokio::process::Command::new("which")
                .arg(name)
                .output()
                .await
            {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        return Ok(path);
                    }
                }
            }
        }
        Err(FetchError::Browser(
            "Chrome/Chromium executable not found".to_string(),
        ))
    }

    /// Shut down the shared engine.
    ///
    /// Waits for any in-flight page operation (they hold the same lock),
    /// then closes the browser. Shutdown failures are logged and swallowed;
    /// a later fetch simply relaunches.
    pub async fn close(&self) {
        let mut guard = self.inner.lock().await;
        if let Some(mut handle) = guard.take() {
            if let Err(err) = handle.browser.close().await {
                warn!(error = %err, "browser close failed");
            }
            handle.handler_task.abort();
            info!("browser closed");
        }
    }

    /// Whether the engine is currently launched (used by tests and status
    /// reporting; does not launch)
    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close_without_launch_is_noop() {
        let session = BrowserSession::new();
        assert!(!session.is_running().await);
        session.close().await;
        assert!(!session.is_running().await);
    }
}
