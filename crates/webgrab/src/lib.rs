//! webgrab - agent-friendly web content retrieval
//!
//! Fetches remote content on behalf of a calling agent and returns it
//! through a transport whose responses are bounded in size. Two concerns
//! drive the design:
//!
//! - **Chunked delivery**: content larger than the per-response limit is
//!   split into ordered segments held in a TTL-evicting [`ChunkStore`];
//!   follow-up calls page through them with an opaque id and a byte cursor.
//! - **Adaptive fetching**: a lightweight HTTP path runs first; failures
//!   whose signature suggests bot-blocking or required JavaScript are
//!   replayed once through a shared headless-browser path.
//!
//! [`Tool`] is the caller-facing surface; the transport binding (see the
//! `webgrab-cli` crate) only serializes its responses.

pub mod browser;
pub mod budget;
pub mod chunks;
pub mod classify;
mod convert;
mod error;
pub mod fetchers;
mod messages;
pub mod proxy;
pub mod strategy;
mod tool;
mod types;

pub use browser::BrowserSession;
pub use budget::{SizeBudget, DEFAULT_CONTENT_SIZE_LIMIT, MIN_CONTENT_SIZE_LIMIT};
pub use chunks::{split_content_into_raw_chunks, ChunkStore, SplitContent, CHUNK_TTL};
pub use classify::{classify, classify_text, should_switch_to_browser};
pub use convert::{html_to_markdown, html_to_text, parse_json};
pub use error::{ErrorKind, FetchError};
pub use messages::Catalog;
pub use strategy::{FetchMode, FetchStrategy};
pub use tool::{Tool, ToolBuilder};
pub use types::{ContentPiece, FetchRequest, FetchResponse, ResponseMetadata};

/// Default User-Agent string
pub const DEFAULT_USER_AGENT: &str = "Everruns WebGrab/1.0";

/// Tool description for LLM consumption
pub const TOOL_DESCRIPTION: &str = r#"Fetches content from a URL with automatic chunking and browser fallback.

- Splits oversized content into retrievable chunks (chunkId + startCursor)
- Falls back to a headless browser when a site blocks plain HTTP clients
- Converts HTML to markdown or plain text
- Proxy support via request parameter or system environment"#;

/// Extended documentation for LLM consumption (llmtxt)
pub const TOOL_LLMTXT: &str = r#"# WebGrab Tool

Fetches content from a URL, with chunked delivery for oversized bodies and a
one-shot fallback to a headless browser for sites that block plain HTTP
clients or require JavaScript.

## Input Parameters
- `url` (required unless continuing): http:// or https:// URL
- `method` (optional): HTTP method, default GET
- `headers` (optional): opaque header passthrough
- `proxy` (optional): outbound proxy URL; otherwise resolved from the
  environment unless `useSystemProxy` is false
- `timeout` (optional): per-request deadline in milliseconds
- `useBrowser` (optional): force the browser path
- `autoDetectMode` (optional, default true): allow the automatic switch to
  the browser path when the plain fetch is blocked
- `waitForSelector`, `waitForTimeout`, `scrollToBottom`, `saveCookies`,
  `closeBrowser` (optional): browser-path controls
- `contentSizeLimit` (optional, default 50000): max bytes per response
- `chunkId` + `startCursor` (optional): continue a chunked delivery
- `asMarkdown` / `asText` (optional): HTML conversion

## Output Fields
- `content`: list of `{type, text}` pieces
- `isError`: true when the fetch failed
- `isChunked`, `totalChunks`, `currentChunk`, `chunkId`, `hasMoreChunks`,
  `totalBytes`, `fetchedBytes`, `remainingBytes`, `isLastChunk`: chunked
  delivery bookkeeping
- `metadata`: url, final url, status code, content type, applied format

## Chunked delivery
When a response carries `isChunked: true`, call the tool again with the
returned `chunkId` and `startCursor` from the footer to get the next
segment. Chunk sets expire after 10 minutes.

## Errors
Failures come back as structured responses with `isError: true` - including
not-found/expired chunk ids and out-of-range cursors.
"#;
