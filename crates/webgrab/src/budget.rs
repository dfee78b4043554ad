//! Size budgeting for chunked delivery
//!
//! A delivered segment plus its continuation footer must never exceed the
//! caller's size limit, so the content budget is the limit minus the byte
//! length of the worst-case footer. The footer is rendered through the same
//! catalog the response layer uses; its text varies with locale and with the
//! magnitude of the counters, so the overhead is recomputed per call rather
//! than baked in as a constant.

use std::sync::Arc;

use crate::messages::{Catalog, CHUNK_FOOTER};

/// Lower bound on a usable per-response size limit (4 KB)
pub const MIN_CONTENT_SIZE_LIMIT: usize = 4 * 1024;

/// Default per-response content size limit (50 KB), overridable per request
pub const DEFAULT_CONTENT_SIZE_LIMIT: usize = 50_000;

/// Computes how many content bytes fit in one delivered segment.
#[derive(Debug, Clone)]
pub struct SizeBudget {
    catalog: Arc<Catalog>,
}

impl SizeBudget {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Content bytes available once the worst-case footer is subtracted.
    ///
    /// Strictly positive for any `size_limit >=` [`MIN_CONTENT_SIZE_LIMIT`].
    pub fn effective_chunk_size(&self, size_limit: usize) -> usize {
        let overhead = self.worst_case_overhead();
        size_limit.saturating_sub(overhead).max(1)
    }

    /// Byte-length comparison; multi-byte characters count as their UTF-8
    /// width, not as one.
    pub fn exceeds_limit(&self, content: &str, size_limit: usize) -> bool {
        content.len() > size_limit
    }

    /// Byte size of the largest footer the response layer could attach:
    /// a 36-character id and counters at the top of their representable
    /// range.
    fn worst_case_overhead(&self) -> usize {
        let max_counter = u64::MAX.to_string();
        let widest_id = "f".repeat(36);
        let footer = self.catalog.translate(
            CHUNK_FOOTER,
            &[
                ("current", max_counter.clone()),
                ("total", max_counter.clone()),
                ("id", widest_id),
                ("fetched", max_counter.clone()),
                ("totalBytes", max_counter.clone()),
                ("remaining", max_counter.clone()),
                ("cursor", max_counter),
            ],
        );
        footer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget() -> SizeBudget {
        SizeBudget::new(Arc::new(Catalog::default()))
    }

    #[test]
    fn test_effective_size_is_positive_at_minimum() {
        let b = budget();
        let effective = b.effective_chunk_size(MIN_CONTENT_SIZE_LIMIT);
        assert!(effective > 0);
        assert!(effective < MIN_CONTENT_SIZE_LIMIT);
    }

    #[test]
    fn test_effective_size_leaves_room_for_footer() {
        let b = budget();
        let limit = DEFAULT_CONTENT_SIZE_LIMIT;
        let effective = b.effective_chunk_size(limit);
        // Worst-case footer must fit in the reserved slack
        assert!(limit - effective >= b.worst_case_overhead());
    }

    #[test]
    fn test_effective_size_never_zero() {
        let b = budget();
        assert!(b.effective_chunk_size(0) >= 1);
        assert!(b.effective_chunk_size(10) >= 1);
    }

    #[test]
    fn test_exceeds_limit_counts_bytes_not_chars() {
        let b = budget();
        // Four three-byte characters: 4 chars, 12 bytes
        let s = "\u{3042}\u{3044}\u{3046}\u{3048}";
        assert_eq!(s.chars().count(), 4);
        assert!(b.exceeds_limit(s, 11));
        assert!(!b.exceeds_limit(s, 12));
    }

    #[test]
    fn test_overhead_tracks_catalog_template() {
        let b = budget();
        // The worst-case render must match what the catalog would emit for
        // maximal parameter values
        let overhead = b.worst_case_overhead();
        assert!(overhead > 36); // at least the id alone
        assert_eq!(
            DEFAULT_CONTENT_SIZE_LIMIT - b.effective_chunk_size(DEFAULT_CONTENT_SIZE_LIMIT),
            overhead
        );
    }
}
