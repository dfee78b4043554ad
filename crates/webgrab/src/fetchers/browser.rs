//! Browser-rendered fetch path
//!
//! Delegates to the shared [`BrowserSession`]; exists so the strategy layer
//! sees the browser path through the same [`PageFetcher`] seam as the HTTP
//! path.

use std::sync::Arc;

use async_trait::async_trait;

use crate::browser::BrowserSession;
use crate::error::FetchError;
use crate::fetchers::{PageFetcher, PageRequest, RawPage};

/// Fetcher backed by the shared browser engine
pub struct BrowserFetcher {
    session: Arc<BrowserSession>,
}

impl BrowserFetcher {
    pub fn new(session: Arc<BrowserSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn fetch(&self, request: &PageRequest) -> Result<RawPage, FetchError> {
        self.session.fetch_page(request).await
    }
}
