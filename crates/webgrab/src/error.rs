//! Error types for webgrab

use std::time::Duration;
use thiserror::Error;

/// Failure category assigned at the point of failure.
///
/// Classification prefers these structured kinds; keyword matching against
/// diagnostic text is only the fallback for opaque third-party errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection-level failure (DNS, refused, reset)
    Network,
    /// The remote is blocking automated clients (403, challenge pages)
    AccessDenied,
    /// The request or an internal wait exceeded its deadline
    Timeout,
    /// The response body could not be parsed
    Parse,
    /// The request was malformed before any I/O happened
    Validation,
    /// The browser-automation engine failed
    Browser,
    /// A chunk id that is unknown or whose set has expired
    InvalidChunkId,
    /// A cursor or index outside the stored range
    InvalidCursor,
    /// Anything that fits no other category
    Unknown,
}

/// Errors that can occur during fetch and chunk operations
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL is missing
    #[error("Missing required parameter: url")]
    MissingUrl,

    /// URL has invalid scheme
    #[error("Invalid URL: must start with http:// or https://")]
    InvalidUrlScheme,

    /// A caller-supplied header could not be used
    #[error("Invalid header {name}: {reason}")]
    InvalidHeader {
        /// Header name as supplied by the caller
        name: String,
        /// Why the header was rejected
        reason: String,
    },

    /// Failed to build the HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    /// The server answered with an error status
    #[error("Request failed with status {status}")]
    HttpStatus {
        /// HTTP status code from the response
        status: u16,
    },

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The operation exceeded its deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The response body could not be parsed
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Binary payloads are not deliverable as text
    #[error("Binary content is not supported: {0}")]
    BinaryContent(String),

    /// Browser-automation failure
    #[error("Browser error: {0}")]
    Browser(String),

    /// Unknown or expired chunk id
    #[error("No chunk data found for id {0}")]
    UnknownChunkId(String),

    /// Cursor or index out of the stored range
    #[error("Cursor {cursor} is out of range for chunk set {id}")]
    InvalidCursor {
        /// The chunk-set handle the cursor was applied to
        id: String,
        /// The offending byte offset
        cursor: usize,
    },

    /// Other request failure with an opaque message
    #[error("Request failed: {0}")]
    Other(String),
}

impl FetchError {
    /// Structured kind assigned at construction.
    ///
    /// [`Other`](FetchError::Other) maps to [`ErrorKind::Unknown`] so the
    /// classifier falls through to keyword matching on its text.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::MissingUrl
            | FetchError::InvalidUrlScheme
            | FetchError::InvalidHeader { .. }
            | FetchError::BinaryContent(_) => ErrorKind::Validation,
            FetchError::ClientBuild(_) | FetchError::Network(_) => ErrorKind::Network,
            FetchError::HttpStatus { status } => match *status {
                401 | 403 | 407 | 429 => ErrorKind::AccessDenied,
                408 | 504 => ErrorKind::Timeout,
                502 | 503 => ErrorKind::Network,
                _ => ErrorKind::Unknown,
            },
            FetchError::Timeout(_) => ErrorKind::Timeout,
            FetchError::Parse(_) => ErrorKind::Parse,
            FetchError::Browser(_) => ErrorKind::Browser,
            FetchError::UnknownChunkId(_) => ErrorKind::InvalidChunkId,
            FetchError::InvalidCursor { .. } => ErrorKind::InvalidCursor,
            FetchError::Other(_) => ErrorKind::Unknown,
        }
    }

    /// Map a reqwest error into the structured taxonomy
    pub fn from_reqwest(err: reqwest::Error, deadline: Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(deadline)
        } else if err.is_connect() {
            FetchError::Network(err.to_string())
        } else {
            FetchError::Other(err.to_string())
        }
    }
}
