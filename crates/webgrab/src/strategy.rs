//! Fetch path selection and one-shot fallback
//!
//! Per request: the lightweight HTTP path runs first unless the caller asked
//! for the browser outright. When it fails with a signature that suggests
//! script execution or bot blocking, the request is replayed once through
//! the browser path. The browser path never falls back further; its failure
//! is the failure the caller sees.

use std::time::Duration;

use tracing::{debug, warn};

use crate::classify;
use crate::error::FetchError;
use crate::fetchers::{PageFetcher, PageRequest, RawPage};

/// Bound on browser-path attempts per request
const MAX_BROWSER_ATTEMPTS: u32 = 3;

/// Base delay for the exponential backoff between browser attempts
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Upper bound on the additive jitter between attempts
const MAX_JITTER_MS: u64 = 250;

/// Which path(s) a request may use
#[derive(Debug, Clone, Copy)]
pub struct FetchMode {
    /// Skip the lightweight path entirely
    pub use_browser: bool,
    /// Allow the automatic switch to the browser path on failure
    pub auto_detect: bool,
}

impl Default for FetchMode {
    fn default() -> Self {
        Self {
            use_browser: false,
            auto_detect: true,
        }
    }
}

/// Executes requests against the two fetch paths
pub struct FetchStrategy {
    http: Box<dyn PageFetcher>,
    browser: Box<dyn PageFetcher>,
}

impl FetchStrategy {
    pub fn new(http: Box<dyn PageFetcher>, browser: Box<dyn PageFetcher>) -> Self {
        Self { http, browser }
    }

    /// Run one request through the state machine.
    ///
    /// The fallback transition fires at most once; a browser-path failure is
    /// terminal and propagates as-is.
    pub async fn execute(
        &self,
        request: &PageRequest,
        mode: FetchMode,
    ) -> Result<RawPage, FetchError> {
        if mode.use_browser {
            return self.browser_fetch_with_retries(request).await;
        }

        match self.http.fetch(request).await {
            Ok(page) => Ok(page),
            Err(err) => {
                if mode.auto_detect && classify::should_switch_to_browser(&err) {
                    debug!(
                        url = %request.url,
                        error = %err,
                        "lightweight fetch failed, switching to browser"
                    );
                    self.browser_fetch_with_retries(request).await
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Browser path with bounded attempts and jittered exponential backoff;
    /// exceeding the bound surfaces the last observed failure.
    async fn browser_fetch_with_retries(
        &self,
        request: &PageRequest,
    ) -> Result<RawPage, FetchError> {
        let mut last_err = FetchError::Browser("no browser attempts executed".to_string());

        for attempt in 0..MAX_BROWSER_ATTEMPTS {
            if attempt > 0 {
                let delay = retry_delay(attempt - 1, RETRY_BASE_DELAY) + jitter();
                debug!(attempt, ?delay, "retrying browser fetch");
                tokio::time::sleep(delay).await;
            }

            match tokio::time::timeout(request.timeout, self.browser.fetch(request)).await {
                Ok(Ok(page)) => return Ok(page),
                Ok(Err(err)) => {
                    warn!(attempt, error = %err, url = %request.url, "browser fetch failed");
                    last_err = err;
                }
                Err(_) => {
                    warn!(attempt, url = %request.url, "browser fetch timed out");
                    last_err = FetchError::Timeout(request.timeout);
                }
            }
        }

        Err(last_err)
    }
}

/// `base * 2^retry`, saturating
fn retry_delay(retry: u32, base: Duration) -> Duration {
    base.saturating_mul(2_u32.saturating_pow(retry))
}

/// Small additive jitter so concurrent retries spread out; derived from the
/// clock because nothing here needs more than de-synchronization
fn jitter() -> Duration {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    Duration::from_millis(nanos % MAX_JITTER_MS)
}
