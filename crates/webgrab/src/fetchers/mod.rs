//! Fetch path implementations
//!
//! Two ways to obtain a page: a direct HTTP round trip and a browser
//! rendering pass. Both implement [`PageFetcher`] so the strategy layer can
//! treat them uniformly and tests can substitute either.

mod browser;
mod http;

pub use browser::BrowserFetcher;
pub use http::HttpFetcher;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;

/// Default per-request deadline
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolved, validated inputs for one fetch attempt
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// Target URL (http/https, validated upstream)
    pub url: String,
    /// HTTP method, GET when empty
    pub method: Option<String>,
    /// Opaque header passthrough
    pub headers: HashMap<String, String>,
    /// Resolved outbound proxy, if any
    pub proxy: Option<String>,
    /// Deadline for the whole attempt
    pub timeout: Duration,
    /// Redirect cap for the HTTP path
    pub max_redirects: Option<usize>,
    /// CSS selector the browser path waits for
    pub wait_for_selector: Option<String>,
    /// Bound on the selector wait
    pub wait_for_timeout: Option<Duration>,
    /// Scroll the page so lazy content renders (browser path)
    pub scroll_to_bottom: bool,
    /// Retain session cookies after the fetch (browser path)
    pub save_cookies: bool,
}

impl PageRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: None,
            headers: HashMap::new(),
            proxy: None,
            timeout: DEFAULT_TIMEOUT,
            max_redirects: None,
            wait_for_selector: None,
            wait_for_timeout: None,
            scroll_to_bottom: false,
            save_cookies: false,
        }
    }
}

/// Raw fetched page, before conversion and chunking
#[derive(Debug, Clone)]
pub struct RawPage {
    /// Requested URL
    pub url: String,
    /// URL after redirects/navigation
    pub final_url: String,
    /// HTTP status (the browser path reports 200 for a rendered page)
    pub status: u16,
    /// Content-Type header value when known
    pub content_type: Option<String>,
    /// Decoded body text
    pub body: String,
    /// True when the body was cut short by the read deadline
    pub truncated: bool,
}

/// A way of turning a [`PageRequest`] into a [`RawPage`]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Identifier for logging
    fn name(&self) -> &'static str;

    /// Execute the fetch
    async fn fetch(&self, request: &PageRequest) -> Result<RawPage, FetchError>;
}
