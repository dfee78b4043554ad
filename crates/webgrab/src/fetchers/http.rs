//! Lightweight HTTP fetch path
//!
//! A plain reqwest round trip: no script execution, cheap enough to try
//! first on every request. Error statuses (>= 400) are reported as failures
//! carrying the status code so the classifier can decide whether the
//! browser path should take over.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::redirect::Policy;
use std::time::Duration;
use tracing::{error, warn};

use crate::error::FetchError;
use crate::fetchers::{PageFetcher, PageRequest, RawPage};
use crate::DEFAULT_USER_AGENT;

/// Binary content type prefixes that cannot be delivered as text
const BINARY_PREFIXES: &[&str] = &[
    "image/",
    "audio/",
    "video/",
    "application/octet-stream",
    "application/pdf",
    "application/zip",
    "application/gzip",
    "application/x-tar",
    "font/",
];

/// Redirect cap when the caller does not set one
const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Direct HTTP fetcher
pub struct HttpFetcher {
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_USER_AGENT)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, request: &PageRequest) -> Result<RawPage, FetchError> {
        let headers = build_headers(&self.user_agent, request)?;

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(Policy::limited(
                request.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS),
            ))
            .connect_timeout(request.timeout.min(Duration::from_secs(10)))
            .timeout(request.timeout);

        if let Some(proxy) = request.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| FetchError::Other(format!("invalid proxy URL: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(FetchError::ClientBuild)?;

        let method = match request.method.as_deref() {
            None | Some("") => reqwest::Method::GET,
            Some(m) => reqwest::Method::from_bytes(m.to_uppercase().as_bytes())
                .map_err(|_| FetchError::Other(format!("invalid HTTP method: {m}")))?,
        };

        let response = client
            .request(method, &request.url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, request.timeout))?;

        let status = response.status().as_u16();
        if status >= 400 {
            // Surface the status as a classified failure so an access-denied
            // signature can trigger the browser fallback
            return Err(FetchError::HttpStatus { status });
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if let Some(ref ct) = content_type {
            if is_binary_content_type(ct) {
                return Err(FetchError::BinaryContent(ct.clone()));
            }
        }

        let (body, truncated) = read_body_with_deadline(response, request.timeout).await;

        Ok(RawPage {
            url: request.url.clone(),
            final_url,
            status,
            content_type,
            body: String::from_utf8_lossy(&body).to_string(),
            truncated,
        })
    }
}

fn build_headers(user_agent: &str, request: &PageRequest) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
    );
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html, text/markdown, text/plain, application/json, */*;q=0.8"),
    );
    for (name, value) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            FetchError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            }
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| FetchError::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn is_binary_content_type(content_type: &str) -> bool {
    let ct = content_type.to_lowercase();
    BINARY_PREFIXES.iter().any(|prefix| ct.starts_with(prefix))
}

/// Stream the body under a deadline, keeping whatever arrived on expiry
async fn read_body_with_deadline(response: reqwest::Response, deadline: Duration) -> (Bytes, bool) {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    let cutoff = tokio::time::Instant::now() + deadline;

    loop {
        tokio::select! {
            chunk = stream.next() => {
                match chunk {
                    Some(Ok(bytes)) => body.extend_from_slice(&bytes),
                    Some(Err(e)) => {
                        error!("error reading body: {e}");
                        let partial = !body.is_empty();
                        return (Bytes::from(body), partial);
                    }
                    None => return (Bytes::from(body), false),
                }
            }
            _ = tokio::time::sleep_until(cutoff) => {
                warn!("body read deadline reached, returning partial content");
                return (Bytes::from(body), true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_binary_content_type() {
        assert!(is_binary_content_type("image/png"));
        assert!(is_binary_content_type("application/pdf"));
        assert!(is_binary_content_type("font/woff2"));
        assert!(!is_binary_content_type("text/html"));
        assert!(!is_binary_content_type("application/json"));
    }

    #[test]
    fn test_build_headers_passthrough() {
        let mut request = PageRequest::new("https://example.com");
        request
            .headers
            .insert("x-custom".to_string(), "value".to_string());
        let headers = build_headers("TestAgent/1.0", &request).unwrap();
        assert_eq!(headers.get("x-custom").unwrap(), "value");
        assert_eq!(headers.get(USER_AGENT).unwrap(), "TestAgent/1.0");
    }

    #[test]
    fn test_build_headers_rejects_bad_name() {
        let mut request = PageRequest::new("https://example.com");
        request
            .headers
            .insert("bad header".to_string(), "v".to_string());
        assert!(matches!(
            build_headers("A/1.0", &request),
            Err(FetchError::InvalidHeader { .. })
        ));
    }
}
