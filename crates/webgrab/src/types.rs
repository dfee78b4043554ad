//! Request and response wire shapes
//!
//! Field names are camelCase on the wire to match the transport binding's
//! tool contract. The request is deliberately permissive: unknown fields are
//! ignored and almost everything is optional, with effective-value accessors
//! applying the defaults.

use std::collections::HashMap;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::budget::DEFAULT_CONTENT_SIZE_LIMIT;
use crate::fetchers::DEFAULT_TIMEOUT;

/// Request to fetch a URL or continue a chunked delivery
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    /// The URL to fetch (required unless continuing with chunkId)
    #[serde(default)]
    pub url: String,

    /// HTTP method (default GET)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Opaque header passthrough
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,

    /// Explicit outbound proxy URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    /// Per-request timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Redirect cap for the lightweight path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_redirects: Option<usize>,

    /// Consult system proxy sources when no explicit proxy is given
    /// (default true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_system_proxy: Option<bool>,

    /// Force the browser path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_browser: Option<bool>,

    /// Allow the automatic lightweight-to-browser switch (default true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_detect_mode: Option<bool>,

    /// CSS selector the browser path waits for before reading content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_selector: Option<String>,

    /// Bound on the selector wait, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_timeout: Option<u64>,

    /// Scroll to the bottom so lazy-loaded content renders (browser path)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_to_bottom: Option<bool>,

    /// Retain session cookies after the fetch (browser path)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_cookies: Option<bool>,

    /// Close the shared browser once this request completes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_browser: Option<bool>,

    /// Per-response content size limit in bytes (default 50000)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_size_limit: Option<usize>,

    /// Continuation handle from a previous chunked response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,

    /// Byte offset to resume delivery from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<usize>,

    /// Convert HTML to markdown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_markdown: Option<bool>,

    /// Convert HTML to plain text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_text: Option<bool>,
}

impl FetchRequest {
    /// Create a new request for the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Create a continuation request for a stored chunk set
    pub fn continuation(chunk_id: impl Into<String>, start_cursor: usize) -> Self {
        Self {
            chunk_id: Some(chunk_id.into()),
            start_cursor: Some(start_cursor),
            ..Default::default()
        }
    }

    /// Force the browser path
    pub fn use_browser(mut self) -> Self {
        self.use_browser = Some(true);
        self
    }

    /// Enable markdown conversion
    pub fn as_markdown(mut self) -> Self {
        self.as_markdown = Some(true);
        self
    }

    /// Enable text conversion
    pub fn as_text(mut self) -> Self {
        self.as_text = Some(true);
        self
    }

    /// Override the content size limit
    pub fn content_size_limit(mut self, limit: usize) -> Self {
        self.content_size_limit = Some(limit);
        self
    }

    pub fn effective_timeout(&self) -> Duration {
        self.timeout
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn effective_size_limit(&self) -> usize {
        self.content_size_limit
            .unwrap_or(DEFAULT_CONTENT_SIZE_LIMIT)
    }

    pub fn wants_system_proxy(&self) -> bool {
        self.use_system_proxy.unwrap_or(true)
    }

    pub fn wants_browser(&self) -> bool {
        self.use_browser.unwrap_or(false)
    }

    pub fn auto_detect(&self) -> bool {
        self.auto_detect_mode.unwrap_or(true)
    }
}

/// One piece of response content
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContentPiece {
    /// Piece type, currently always "text"
    #[serde(rename = "type")]
    pub kind: String,
    /// The text payload
    pub text: String,
}

impl ContentPiece {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.into(),
        }
    }
}

/// Fetch metadata attached to successful responses
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Requested URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// URL after redirects/navigation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,

    /// HTTP status code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    /// Content-Type header value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Applied conversion: "markdown", "text", "json" or "raw"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Which fetch path produced the content: "http" or "browser"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_path: Option<String>,
}

/// Response from a fetch or continuation call
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FetchResponse {
    /// Ordered content pieces
    pub content: Vec<ContentPiece>,

    /// True when this response reports a failure
    pub is_error: bool,

    /// True when the content was split across multiple responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_chunked: Option<bool>,

    /// Total number of segments in the set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<usize>,

    /// 1-based index of the delivered segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_chunk: Option<usize>,

    /// Continuation handle for follow-up requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,

    /// True when more segments remain after this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_more_chunks: Option<bool>,

    /// Byte length of the full content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<usize>,

    /// Bytes delivered up to and including this segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_bytes: Option<usize>,

    /// Bytes still undelivered after this segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_bytes: Option<usize>,

    /// True when this is the final segment of the set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_last_chunk: Option<bool>,

    /// Fetch metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
}

impl FetchResponse {
    /// Build an error response with a single text piece
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentPiece::text(text)],
            is_error: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let req = FetchRequest::new("https://example.com");
        assert_eq!(req.effective_timeout(), DEFAULT_TIMEOUT);
        assert_eq!(req.effective_size_limit(), DEFAULT_CONTENT_SIZE_LIMIT);
        assert!(req.wants_system_proxy());
        assert!(!req.wants_browser());
        assert!(req.auto_detect());
    }

    #[test]
    fn test_request_builder() {
        let req = FetchRequest::new("https://example.com")
            .use_browser()
            .as_markdown()
            .content_size_limit(10_000);
        assert!(req.wants_browser());
        assert_eq!(req.as_markdown, Some(true));
        assert_eq!(req.effective_size_limit(), 10_000);
    }

    #[test]
    fn test_request_wire_names_are_camel_case() {
        let json = r#"{
            "url": "https://example.com",
            "useBrowser": true,
            "autoDetectMode": false,
            "contentSizeLimit": 20000,
            "chunkId": "abc",
            "startCursor": 100
        }"#;
        let req: FetchRequest = serde_json::from_str(json).unwrap();
        assert!(req.wants_browser());
        assert!(!req.auto_detect());
        assert_eq!(req.content_size_limit, Some(20_000));
        assert_eq!(req.chunk_id.as_deref(), Some("abc"));
        assert_eq!(req.start_cursor, Some(100));
    }

    #[test]
    fn test_response_serialization_omits_absent_fields() {
        let resp = FetchResponse {
            content: vec![ContentPiece::text("hello")],
            is_error: false,
            ..Default::default()
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"type\":\"text\""));
        assert!(json.contains("\"isError\":false"));
        assert!(!json.contains("chunkId"));
        assert!(!json.contains("totalChunks"));
    }

    #[test]
    fn test_chunked_response_wire_shape() {
        let resp = FetchResponse {
            content: vec![ContentPiece::text("part")],
            is_error: false,
            is_chunked: Some(true),
            total_chunks: Some(4),
            current_chunk: Some(1),
            chunk_id: Some("id".into()),
            has_more_chunks: Some(true),
            total_bytes: Some(200_000),
            fetched_bytes: Some(50_000),
            remaining_bytes: Some(150_000),
            is_last_chunk: Some(false),
            metadata: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"isChunked\":true"));
        assert!(json.contains("\"currentChunk\":1"));
        assert!(json.contains("\"hasMoreChunks\":true"));
        assert!(json.contains("\"isLastChunk\":false"));
    }

    #[test]
    fn test_error_response() {
        let resp = FetchResponse::error("boom");
        assert!(resp.is_error);
        assert_eq!(resp.content[0].text, "boom");
        assert_eq!(resp.content[0].kind, "text");
    }
}
