//! Caller-facing message catalog
//!
//! All human-readable text attached to responses goes through
//! [`Catalog::translate`] so a localized catalog can be swapped in without
//! touching the core. The continuation footer template lives here because
//! the size-budget calculation must render the exact same text the response
//! layer emits.

use std::collections::HashMap;

/// Key for the footer appended to every non-final delivered segment
pub const CHUNK_FOOTER: &str = "chunk.footer";
/// Key for the footer appended to the final segment of a set
pub const CHUNK_FOOTER_LAST: &str = "chunk.footerLast";
/// Key for the unknown/expired chunk id response
pub const CHUNK_NOT_FOUND: &str = "chunk.notFound";
/// Key for the out-of-range cursor response
pub const CHUNK_INVALID_CURSOR: &str = "chunk.invalidCursor";
/// Key for the generic fetch-failure response
pub const FETCH_FAILED: &str = "error.fetchFailed";

/// Keyed message catalog with `{param}` substitution.
///
/// `translate` never fails: an unknown key is returned verbatim so a missing
/// translation degrades to something greppable instead of an error.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: HashMap<&'static str, &'static str>,
}

impl Default for Catalog {
    fn default() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            CHUNK_FOOTER,
            "\n\n--- Chunk {current} of {total} (id: {id}) | bytes {fetched} of {totalBytes}, \
             {remaining} remaining | request again with chunkId and startCursor={cursor} \
             to continue ---",
        );
        entries.insert(
            CHUNK_FOOTER_LAST,
            "\n\n--- Chunk {current} of {total} (id: {id}) | all {totalBytes} bytes \
             delivered ---",
        );
        entries.insert(
            CHUNK_NOT_FOUND,
            "No chunk data found for id {id}. The content may have expired (chunks are \
             kept for {ttlMinutes} minutes) or the id is invalid. Fetch the URL again to \
             get a fresh chunk id.",
        );
        entries.insert(
            CHUNK_INVALID_CURSOR,
            "Start cursor {cursor} is out of range for chunk set {id} ({totalBytes} bytes \
             total).",
        );
        entries.insert(FETCH_FAILED, "Failed to fetch {url}: {error}");
        Self { entries }
    }
}

impl Catalog {
    /// Look up `key` and substitute each `{name}` placeholder.
    ///
    /// Unknown keys come back unchanged; unknown placeholders are left in
    /// place.
    pub fn translate(&self, key: &str, params: &[(&str, String)]) -> String {
        let template = match self.entries.get(key) {
            Some(t) => (*t).to_string(),
            None => return key.to_string(),
        };
        let mut out = template;
        for (name, value) in params {
            out = out.replace(&format!("{{{name}}}"), value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitution() {
        let catalog = Catalog::default();
        let text = catalog.translate(
            FETCH_FAILED,
            &[
                ("url", "https://example.com".to_string()),
                ("error", "connection refused".to_string()),
            ],
        );
        assert_eq!(
            text,
            "Failed to fetch https://example.com: connection refused"
        );
    }

    #[test]
    fn test_missing_key_returns_key() {
        let catalog = Catalog::default();
        assert_eq!(catalog.translate("no.such.key", &[]), "no.such.key");
    }

    #[test]
    fn test_footer_mentions_continuation_fields() {
        let catalog = Catalog::default();
        let text = catalog.translate(
            CHUNK_FOOTER,
            &[
                ("current", "1".to_string()),
                ("total", "4".to_string()),
                ("id", "abc-123".to_string()),
                ("fetched", "50000".to_string()),
                ("totalBytes", "200000".to_string()),
                ("remaining", "150000".to_string()),
                ("cursor", "50000".to_string()),
            ],
        );
        assert!(text.contains("Chunk 1 of 4"));
        assert!(text.contains("id: abc-123"));
        assert!(text.contains("startCursor=50000"));
        assert!(!text.contains('{'));
    }
}
