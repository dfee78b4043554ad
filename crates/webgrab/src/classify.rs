//! Failure classification and the browser-fallback predicate
//!
//! Structured error kinds win; keyword matching against lower-cased
//! diagnostic text only covers opaque third-party failures. Access-denied
//! signatures are checked before network signatures on purpose: blocked
//! requests are the dominant failure cause in this domain and must trigger
//! the browser fallback rather than a bare retry, even when the text also
//! mentions a timeout.

use crate::error::{ErrorKind, FetchError};

/// Access-restriction signatures (checked first)
const ACCESS_DENIED_PATTERNS: &[&str] = &[
    "403",
    "forbidden",
    "access denied",
    "access-denied",
    "cloudflare",
    "captcha",
    "blocked",
    "security check",
    "security-check",
];

/// Connection-level signatures; "timeout" lands here rather than in the
/// timeout category because connect timeouts behave like network failures
/// for fallback purposes
const NETWORK_PATTERNS: &[&str] = &[
    "network",
    "connection",
    "timeout",
    "unreachable",
    "connection refused",
    "connection-refused",
];

const TIMEOUT_PATTERNS: &[&str] = &["timed out", "deadline"];

const PARSE_PATTERNS: &[&str] = &["parse", "json", "syntax"];

const BROWSER_PATTERNS: &[&str] = &["browser", "chrome", "chromium", "page", "cdp"];

const VALIDATION_PATTERNS: &[&str] = &["valid", "schema", "type"];

/// Signatures that warrant the browser fallback beyond pure classification
const BROWSER_SWITCH_PATTERNS: &[&str] = &[
    "javascript",
    "js required",
    "enable javascript",
    "etimedout",
    "econnrefused",
    "fetch failed",
];

/// Classify a failure into its category.
///
/// Errors constructed with a concrete kind keep it; only opaque errors
/// ([`ErrorKind::Unknown`]) go through text matching.
pub fn classify(err: &FetchError) -> ErrorKind {
    match err.kind() {
        ErrorKind::Unknown => classify_text(&diagnostic_text(err)),
        kind => kind,
    }
}

/// Keyword classification of a raw diagnostic string.
///
/// First match wins, evaluated in precedence order: access-denied, network,
/// timeout, parse, browser, validation.
pub fn classify_text(text: &str) -> ErrorKind {
    let lower = text.to_lowercase();

    if matches_any(&lower, ACCESS_DENIED_PATTERNS) {
        ErrorKind::AccessDenied
    } else if matches_any(&lower, NETWORK_PATTERNS) {
        ErrorKind::Network
    } else if matches_any(&lower, TIMEOUT_PATTERNS) {
        ErrorKind::Timeout
    } else if matches_any(&lower, PARSE_PATTERNS) {
        ErrorKind::Parse
    } else if matches_any(&lower, BROWSER_PATTERNS) {
        ErrorKind::Browser
    } else if matches_any(&lower, VALIDATION_PATTERNS) {
        ErrorKind::Validation
    } else {
        ErrorKind::Unknown
    }
}

/// Should a failed lightweight fetch be retried through the browser path?
///
/// True for access-denied and network classifications, and for diagnostic
/// text that mentions script execution being required, a connect-timeout
/// code, or the literal "fetch failed". The predicate is intentionally
/// broader than classification: an unnecessary browser retry is cheap next
/// to a silent permanent failure.
pub fn should_switch_to_browser(err: &FetchError) -> bool {
    match classify(err) {
        ErrorKind::AccessDenied | ErrorKind::Network => true,
        _ => {
            let lower = diagnostic_text(err).to_lowercase();
            matches_any(&lower, BROWSER_SWITCH_PATTERNS)
        }
    }
}

/// Extract diagnostic text from a failure; never fails itself.
fn diagnostic_text(err: &FetchError) -> String {
    err.to_string()
}

fn matches_any(lower: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| lower.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_access_denied_before_network() {
        // "timeout" also appears, but the access signature dominates
        assert_eq!(
            classify_text("blocked by cloudflare, connection timeout"),
            ErrorKind::AccessDenied
        );
        assert_eq!(classify_text("HTTP 403 Forbidden"), ErrorKind::AccessDenied);
        assert_eq!(
            classify_text("security check required"),
            ErrorKind::AccessDenied
        );
    }

    #[test]
    fn test_network_classification() {
        assert_eq!(classify_text("connection refused"), ErrorKind::Network);
        assert_eq!(classify_text("host unreachable"), ErrorKind::Network);
        assert_eq!(classify_text("network is down"), ErrorKind::Network);
    }

    #[test]
    fn test_timeout_classification() {
        assert_eq!(
            classify_text("operation timed out after 30s"),
            ErrorKind::Timeout
        );
        // A literal "timeout" reads as a connection-level failure so it can
        // drive the browser fallback
        assert_eq!(classify_text("connect timeout"), ErrorKind::Network);
    }

    #[test]
    fn test_parse_and_browser_classification() {
        assert_eq!(classify_text("unexpected json token"), ErrorKind::Parse);
        assert_eq!(classify_text("chrome crashed"), ErrorKind::Browser);
    }

    #[test]
    fn test_unknown_classification() {
        assert_eq!(classify_text("some mystery failure"), ErrorKind::Unknown);
    }

    #[test]
    fn test_structured_kind_wins_over_text() {
        // A timeout error whose text never goes through keyword matching
        let err = FetchError::Timeout(Duration::from_secs(5));
        assert_eq!(classify(&err), ErrorKind::Timeout);

        // Opaque errors fall back to text matching
        let err = FetchError::Other("served a captcha page".into());
        assert_eq!(classify(&err), ErrorKind::AccessDenied);
    }

    #[test]
    fn test_switch_on_403_regardless_of_other_keywords() {
        let err = FetchError::HttpStatus { status: 403 };
        assert_eq!(classify(&err), ErrorKind::AccessDenied);
        assert!(should_switch_to_browser(&err));

        let err = FetchError::Other("403 forbidden: request timed out".into());
        assert_eq!(classify(&err), ErrorKind::AccessDenied);
        assert!(should_switch_to_browser(&err));
    }

    #[test]
    fn test_switch_on_network() {
        let err = FetchError::Network("connection reset by peer".into());
        assert!(should_switch_to_browser(&err));
    }

    #[test]
    fn test_switch_on_explicit_signatures() {
        assert!(should_switch_to_browser(&FetchError::Other(
            "fetch failed".into()
        )));
        assert!(should_switch_to_browser(&FetchError::Other(
            "this site requires JavaScript".into()
        )));
        assert!(should_switch_to_browser(&FetchError::Other(
            "connect ETIMEDOUT 1.2.3.4:443".into()
        )));
    }

    #[test]
    fn test_no_switch_on_plain_failures() {
        assert!(!should_switch_to_browser(&FetchError::Parse(
            "bad utf-8".into()
        )));
        assert!(!should_switch_to_browser(&FetchError::HttpStatus {
            status: 404
        }));
        assert!(!should_switch_to_browser(&FetchError::Other(
            "mystery".into()
        )));
    }
}
