//! Tool builder and contract
//!
//! The caller-facing surface: validates requests, drives the fetch strategy,
//! applies conversion, and splits oversized content into stored chunk sets.
//! `execute` is infallible at the surface; every failure becomes a
//! structured `isError` response so the transport binding never has to map
//! exceptions.

use std::sync::Arc;
use std::time::Duration;

use schemars::schema_for;
use tracing::debug;

use crate::browser::BrowserSession;
use crate::budget::SizeBudget;
use crate::chunks::{ChunkStore, CHUNK_TTL};
use crate::convert::{
    filter_excessive_newlines, html_to_markdown, html_to_text, is_html, is_json, parse_json,
};
use crate::error::FetchError;
use crate::fetchers::{BrowserFetcher, HttpFetcher, PageFetcher, PageRequest, RawPage};
use crate::messages::{
    Catalog, CHUNK_FOOTER, CHUNK_FOOTER_LAST, CHUNK_INVALID_CURSOR, CHUNK_NOT_FOUND, FETCH_FAILED,
};
use crate::proxy;
use crate::strategy::{FetchMode, FetchStrategy};
use crate::types::{ContentPiece, FetchRequest, FetchResponse, ResponseMetadata};
use crate::DEFAULT_USER_AGENT;

/// Note appended when a body was cut short by the read deadline
const TRUNCATED_NOTE: &str = "\n\n[..more content timed out...]";

/// Builder for configuring the fetch tool
pub struct ToolBuilder {
    user_agent: Option<String>,
    ttl: Duration,
    catalog: Catalog,
    browser_fetcher: Option<Box<dyn PageFetcher>>,
}

impl Default for ToolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolBuilder {
    pub fn new() -> Self {
        Self {
            user_agent: None,
            ttl: CHUNK_TTL,
            catalog: Catalog::default(),
            browser_fetcher: None,
        }
    }

    /// Set a custom User-Agent
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Override how long stored chunk sets stay retrievable
    pub fn chunk_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Swap in a localized message catalog
    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Substitute the browser-path fetcher (test isolation)
    pub fn browser_fetcher(mut self, fetcher: Box<dyn PageFetcher>) -> Self {
        self.browser_fetcher = Some(fetcher);
        self
    }

    /// Build the tool
    pub fn build(self) -> Tool {
        let catalog = Arc::new(self.catalog);
        let budget = SizeBudget::new(Arc::clone(&catalog));
        let store = Arc::new(ChunkStore::with_ttl(budget, self.ttl));
        let session = Arc::new(BrowserSession::new());

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let http = Box::new(HttpFetcher::new(user_agent));
        let browser = self
            .browser_fetcher
            .unwrap_or_else(|| Box::new(BrowserFetcher::new(Arc::clone(&session))));

        Tool {
            store,
            session,
            strategy: FetchStrategy::new(http, browser),
            catalog,
        }
    }
}

/// Configured fetch tool with explicitly owned shared state.
///
/// The chunk store and browser session are constructed here and injected
/// into the strategy; nothing is process-global, so independent tools are
/// fully isolated.
pub struct Tool {
    store: Arc<ChunkStore>,
    session: Arc<BrowserSession>,
    strategy: FetchStrategy,
    catalog: Arc<Catalog>,
}

impl Default for Tool {
    fn default() -> Self {
        ToolBuilder::new().build()
    }
}

impl Tool {
    /// Create a new tool builder
    pub fn builder() -> ToolBuilder {
        ToolBuilder::new()
    }

    /// Input schema as JSON
    pub fn input_schema(&self) -> serde_json::Value {
        serde_json::to_value(schema_for!(FetchRequest)).unwrap_or_default()
    }

    /// Output schema as JSON
    pub fn output_schema(&self) -> serde_json::Value {
        serde_json::to_value(schema_for!(FetchResponse)).unwrap_or_default()
    }

    /// Execute a fetch or continuation request.
    ///
    /// Never returns an error: failures are delivered as structured
    /// responses with `is_error` set.
    pub async fn execute(&self, request: FetchRequest) -> FetchResponse {
        // Continuation calls never refetch; they read the stored set
        if let Some(chunk_id) = request.chunk_id.clone() {
            return self.serve_continuation(&chunk_id, request.start_cursor.unwrap_or(0));
        }

        let response = match self.fetch_and_package(&request).await {
            Ok(response) => response,
            Err(err) => self.error_response(&request.url, &err),
        };

        if request.close_browser.unwrap_or(false) {
            self.session.close().await;
        }

        response
    }

    async fn fetch_and_package(
        &self,
        request: &FetchRequest,
    ) -> Result<FetchResponse, FetchError> {
        if request.url.is_empty() {
            return Err(FetchError::MissingUrl);
        }
        if !request.url.starts_with("http://") && !request.url.starts_with("https://") {
            return Err(FetchError::InvalidUrlScheme);
        }
        let parsed = url::Url::parse(&request.url).map_err(|_| FetchError::InvalidUrlScheme)?;
        debug!(host = parsed.host_str().unwrap_or(""), "fetching");

        let proxy = proxy::resolve(request.proxy.as_deref(), request.wants_system_proxy()).await;

        let page_request = PageRequest {
            url: request.url.clone(),
            method: request.method.clone(),
            headers: request.headers.clone().unwrap_or_default(),
            proxy,
            timeout: request.effective_timeout(),
            max_redirects: request.max_redirects,
            wait_for_selector: request.wait_for_selector.clone(),
            wait_for_timeout: request.wait_for_timeout.map(Duration::from_millis),
            scroll_to_bottom: request.scroll_to_bottom.unwrap_or(false),
            save_cookies: request.save_cookies.unwrap_or(false),
        };
        let mode = FetchMode {
            use_browser: request.wants_browser(),
            auto_detect: request.auto_detect(),
        };

        let page = self.strategy.execute(&page_request, mode).await?;
        let (format, content) = convert_body(request, &page)?;

        let mut content = filter_excessive_newlines(&content);
        if page.truncated {
            content.push_str(TRUNCATED_NOTE);
        }

        let metadata = ResponseMetadata {
            url: Some(page.url.clone()),
            final_url: Some(page.final_url.clone()),
            status_code: Some(page.status),
            content_type: page.content_type.clone(),
            format: Some(format.to_string()),
            fetch_path: None,
        };

        Ok(self.package_content(request, content, metadata))
    }

    /// Deliver content directly when it fits, otherwise split, store, and
    /// return the first segment with its continuation footer.
    fn package_content(
        &self,
        request: &FetchRequest,
        content: String,
        metadata: ResponseMetadata,
    ) -> FetchResponse {
        let size_limit = request.effective_size_limit();

        if !self.store.exceeds_limit(&content, size_limit) {
            return FetchResponse {
                content: vec![ContentPiece::text(content)],
                is_error: false,
                is_chunked: Some(false),
                metadata: Some(metadata),
                ..Default::default()
            };
        }

        let split = match self.store.split_content_into_chunks(&content, size_limit, 0) {
            Ok(split) => split,
            Err(err) => return self.error_response(&request.url, &err),
        };
        let total_chunks = split.segments.len();
        let total_bytes = split.total_bytes;
        let id = self.store.store_chunks(split.segments.clone());
        debug!(id = %id, total_chunks, total_bytes, "content split for chunked delivery");

        let first = &split.segments[0];
        let fetched = first.len();
        self.segment_response(
            first,
            &id,
            0,
            total_chunks,
            fetched,
            total_bytes,
            Some(metadata),
        )
    }

    /// Serve a follow-up request from the stored set
    fn serve_continuation(&self, chunk_id: &str, cursor: usize) -> FetchResponse {
        let total_chunks = self.store.get_total_chunks(chunk_id);
        if total_chunks == 0 {
            let err = FetchError::UnknownChunkId(chunk_id.to_string());
            debug!(kind = ?err.kind(), id = %chunk_id, "continuation failed");
            let text = self.catalog.translate(
                CHUNK_NOT_FOUND,
                &[
                    ("id", chunk_id.to_string()),
                    ("ttlMinutes", (CHUNK_TTL.as_secs() / 60).to_string()),
                ],
            );
            return FetchResponse::error(text);
        }

        let total_bytes = self.store.total_bytes(chunk_id);
        match self.store.get_chunk_at_cursor(chunk_id, cursor) {
            Some((index, segment, segment_start)) => {
                let fetched = segment_start + segment.len();
                self.segment_response(
                    &segment,
                    chunk_id,
                    index,
                    total_chunks,
                    fetched,
                    total_bytes,
                    None,
                )
            }
            None => {
                let err = FetchError::InvalidCursor {
                    id: chunk_id.to_string(),
                    cursor,
                };
                debug!(kind = ?err.kind(), "continuation failed");
                let text = self.catalog.translate(
                    CHUNK_INVALID_CURSOR,
                    &[
                        ("cursor", cursor.to_string()),
                        ("id", chunk_id.to_string()),
                        ("totalBytes", total_bytes.to_string()),
                    ],
                );
                FetchResponse::error(text)
            }
        }
    }

    /// Assemble the response for one delivered segment, footer included
    #[allow(clippy::too_many_arguments)]
    fn segment_response(
        &self,
        segment: &str,
        id: &str,
        index: usize,
        total_chunks: usize,
        fetched: usize,
        total_bytes: usize,
        metadata: Option<ResponseMetadata>,
    ) -> FetchResponse {
        let remaining = total_bytes.saturating_sub(fetched);
        let is_last = index + 1 == total_chunks;
        let footer_key = if is_last { CHUNK_FOOTER_LAST } else { CHUNK_FOOTER };
        let footer = self.catalog.translate(
            footer_key,
            &[
                ("current", (index + 1).to_string()),
                ("total", total_chunks.to_string()),
                ("id", id.to_string()),
                ("fetched", fetched.to_string()),
                ("totalBytes", total_bytes.to_string()),
                ("remaining", remaining.to_string()),
                ("cursor", fetched.to_string()),
            ],
        );

        FetchResponse {
            content: vec![ContentPiece::text(format!("{segment}{footer}"))],
            is_error: false,
            is_chunked: Some(true),
            total_chunks: Some(total_chunks),
            current_chunk: Some(index + 1),
            chunk_id: Some(id.to_string()),
            has_more_chunks: Some(!is_last),
            total_bytes: Some(total_bytes),
            fetched_bytes: Some(fetched),
            remaining_bytes: Some(remaining),
            is_last_chunk: Some(is_last),
            metadata,
        }
    }

    fn error_response(&self, url: &str, err: &FetchError) -> FetchResponse {
        let text = self.catalog.translate(
            FETCH_FAILED,
            &[("url", url.to_string()), ("error", err.to_string())],
        );
        FetchResponse::error(text)
    }

    /// Shut down the shared browser (also reachable per request via
    /// `close_browser`)
    pub async fn close_browser(&self) {
        self.session.close().await;
    }
}

/// Pick and apply the conversion for a fetched body
fn convert_body(
    request: &FetchRequest,
    page: &RawPage,
) -> Result<(&'static str, String), FetchError> {
    let wants_markdown = request.as_markdown.unwrap_or(false);
    let wants_text = request.as_text.unwrap_or(false);

    if is_html(&page.content_type, &page.body) {
        if wants_markdown {
            return Ok(("markdown", html_to_markdown(&page.body)));
        }
        if wants_text {
            return Ok(("text", html_to_text(&page.body)));
        }
        return Ok(("raw", page.body.clone()));
    }

    if is_json(&page.content_type, &page.body) && !page.truncated {
        // Validate but deliver the original text
        parse_json(&page.body)?;
        return Ok(("json", page.body.clone()));
    }

    Ok(("raw", page.body.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_schemas() {
        let tool = Tool::default();
        let input = tool.input_schema();
        let output = tool.output_schema();
        assert!(input["properties"]["url"].is_object());
        assert!(input["properties"]["chunkId"].is_object());
        assert!(input["properties"]["useBrowser"].is_object());
        assert!(output["properties"]["content"].is_object());
        assert!(output["properties"]["isError"].is_object());
    }

    #[tokio::test]
    async fn test_missing_url_is_structured_error() {
        let tool = Tool::default();
        let response = tool.execute(FetchRequest::new("")).await;
        assert!(response.is_error);
        assert!(response.content[0].text.contains("url"));
    }

    #[tokio::test]
    async fn test_invalid_scheme_is_structured_error() {
        let tool = Tool::default();
        let response = tool.execute(FetchRequest::new("ftp://example.com")).await;
        assert!(response.is_error);
        assert!(response.content[0].text.contains("http"));
    }

    #[tokio::test]
    async fn test_unknown_chunk_id_is_not_found() {
        let tool = Tool::default();
        let response = tool
            .execute(FetchRequest::continuation("no-such-id", 0))
            .await;
        assert!(response.is_error);
        assert!(response.content[0].text.contains("no-such-id"));
        assert!(response.content[0].text.contains("expired"));
    }

    #[test]
    fn test_convert_body_json_validation() {
        let request = FetchRequest::new("https://example.com");
        let page = RawPage {
            url: "https://example.com".into(),
            final_url: "https://example.com".into(),
            status: 200,
            content_type: Some("application/json".into()),
            body: "{broken".into(),
            truncated: false,
        };
        assert!(matches!(
            convert_body(&request, &page),
            Err(FetchError::Parse(_))
        ));
    }

    #[test]
    fn test_convert_body_html_markdown() {
        let request = FetchRequest::new("https://example.com").as_markdown();
        let page = RawPage {
            url: "https://example.com".into(),
            final_url: "https://example.com".into(),
            status: 200,
            content_type: Some("text/html".into()),
            body: "<h1>Hi</h1>".into(),
            truncated: false,
        };
        let (format, content) = convert_body(&request, &page).unwrap();
        assert_eq!(format, "markdown");
        assert!(content.contains("# Hi"));
    }
}
