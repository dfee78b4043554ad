//! TTL-evicting store of ordered content segments
//!
//! Oversized fetch results are split into ordered segments and parked here
//! under an opaque id so follow-up calls can page through them without
//! refetching. Entries expire after a fixed TTL; expiry is enforced lazily
//! on every store and read, so no expired entry is ever served and no
//! background timer is needed.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;
use uuid::Uuid;

use crate::budget::SizeBudget;
use crate::error::FetchError;

/// How long a stored chunk set stays retrievable
pub const CHUNK_TTL: Duration = Duration::from_secs(10 * 60);

/// One stored, immutable sequence of segments
#[derive(Debug)]
struct ChunkSet {
    segments: Vec<String>,
    total_bytes: usize,
    expires_at: Instant,
}

/// Result of splitting content for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitContent {
    /// Ordered segments; concatenated they reproduce the input exactly
    pub segments: Vec<String>,
    /// Byte length of the full (unsplit) content
    pub total_bytes: usize,
}

/// Concurrent, TTL-evicting keyed store of segment sequences.
///
/// All operations are safe under concurrent access; the map is guarded by a
/// mutex and every critical section is short. Reads never observe a
/// partially written set because a set is inserted fully built.
#[derive(Debug)]
pub struct ChunkStore {
    sets: Mutex<HashMap<String, ChunkSet>>,
    budget: SizeBudget,
    ttl: Duration,
}

impl ChunkStore {
    pub fn new(budget: SizeBudget) -> Self {
        Self::with_ttl(budget, CHUNK_TTL)
    }

    pub fn with_ttl(budget: SizeBudget, ttl: Duration) -> Self {
        Self {
            sets: Mutex::new(HashMap::new()),
            budget,
            ttl,
        }
    }

    /// Store an ordered segment sequence and return its fresh opaque id.
    ///
    /// Also sweeps expired sets while the lock is held; the sweep is
    /// amortized over stores instead of running on a timer.
    pub fn store_chunks(&self, segments: Vec<String>) -> String {
        let total_bytes = segments.iter().map(|s| s.len()).sum();
        let id = Uuid::new_v4().to_string();
        let now = Instant::now();

        let mut sets = self.sets.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Self::sweep_expired(&mut sets, now);
        sets.insert(
            id.clone(),
            ChunkSet {
                segments,
                total_bytes,
                expires_at: now + self.ttl,
            },
        );
        debug!(id = %id, sets = sets.len(), "stored chunk set");
        id
    }

    /// Segment at `index`, or `None` when the id is unknown, the set has
    /// expired, or the index is out of range. Never panics on bad input.
    pub fn get_chunk(&self, id: &str, index: usize) -> Option<String> {
        let mut sets = self.sets.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let set = Self::live_entry(&mut sets, id)?;
        set.segments.get(index).cloned()
    }

    /// Locate the segment containing byte offset `cursor`.
    ///
    /// Returns `(index, segment, segment_start)` where `segment_start` is
    /// the byte offset the segment begins at. A cursor at or past the total
    /// byte length is out of range.
    pub fn get_chunk_at_cursor(&self, id: &str, cursor: usize) -> Option<(usize, String, usize)> {
        let mut sets = self.sets.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let set = Self::live_entry(&mut sets, id)?;
        if cursor >= set.total_bytes {
            return None;
        }
        let mut start = 0usize;
        for (index, segment) in set.segments.iter().enumerate() {
            let end = start + segment.len();
            if cursor < end {
                return Some((index, segment.clone(), start));
            }
            start = end;
        }
        None
    }

    /// Number of segments, `0` when unknown or expired
    pub fn get_total_chunks(&self, id: &str) -> usize {
        let mut sets = self.sets.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match Self::live_entry(&mut sets, id) {
            Some(set) => set.segments.len(),
            None => 0,
        }
    }

    /// Total byte length of the stored content, `0` when unknown or expired
    pub fn total_bytes(&self, id: &str) -> usize {
        let mut sets = self.sets.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match Self::live_entry(&mut sets, id) {
            Some(set) => set.total_bytes,
            None => 0,
        }
    }

    /// Drop a set explicitly (before its TTL)
    pub fn remove(&self, id: &str) {
        let mut sets = self.sets.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        sets.remove(id);
    }

    /// Split `content` starting at byte `offset` into deliverable segments.
    ///
    /// `total_bytes` reflects the whole content; the effective per-segment
    /// size comes from the budget so a segment plus its footer stays under
    /// `size_limit`. An offset past the end or inside a multi-byte character
    /// is an invalid-cursor error, distinct from not-found.
    pub fn split_content_into_chunks(
        &self,
        content: &str,
        size_limit: usize,
        offset: usize,
    ) -> Result<SplitContent, FetchError> {
        if offset > content.len() || !content.is_char_boundary(offset) {
            return Err(FetchError::InvalidCursor {
                id: String::new(),
                cursor: offset,
            });
        }
        let effective = self.budget.effective_chunk_size(size_limit);
        Ok(SplitContent {
            segments: split_content_into_raw_chunks(&content[offset..], effective),
            total_bytes: content.len(),
        })
    }

    /// Does this content need splitting at all?
    pub fn exceeds_limit(&self, content: &str, size_limit: usize) -> bool {
        self.budget.exceeds_limit(content, size_limit)
    }

    fn live_entry<'a>(
        sets: &'a mut HashMap<String, ChunkSet>,
        id: &str,
    ) -> Option<&'a ChunkSet> {
        let expired = match sets.get(id) {
            Some(set) => set.expires_at <= Instant::now(),
            None => return None,
        };
        if expired {
            sets.remove(id);
            debug!(id = %id, "chunk set expired");
            return None;
        }
        sets.get(id)
    }

    fn sweep_expired(sets: &mut HashMap<String, ChunkSet>, now: Instant) {
        let before = sets.len();
        sets.retain(|_, set| set.expires_at > now);
        let removed = before - sets.len();
        if removed > 0 {
            debug!(removed, "swept expired chunk sets");
        }
    }
}

/// Greedy char-granular split: fill the current segment while the next
/// character still fits in `size_limit` bytes, then start a new one. A
/// multi-byte character is never split across segments. Content that fits
/// comes back as a single segment equal to the input.
pub fn split_content_into_raw_chunks(content: &str, size_limit: usize) -> Vec<String> {
    if content.len() <= size_limit {
        return vec![content.to_string()];
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    for ch in content.chars() {
        if !current.is_empty() && current.len() + ch.len_utf8() > size_limit {
            segments.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Catalog;
    use std::sync::Arc;

    fn store() -> ChunkStore {
        ChunkStore::new(SizeBudget::new(Arc::new(Catalog::default())))
    }

    fn expired_store() -> ChunkStore {
        ChunkStore::with_ttl(
            SizeBudget::new(Arc::new(Catalog::default())),
            Duration::ZERO,
        )
    }

    #[test]
    fn test_store_and_retrieve() {
        let store = store();
        let segments = vec!["first".to_string(), "second".to_string(), "third".to_string()];
        let id = store.store_chunks(segments.clone());

        assert_eq!(store.get_total_chunks(&id), 3);
        for (i, expected) in segments.iter().enumerate() {
            assert_eq!(store.get_chunk(&id, i).as_ref(), Some(expected));
        }
        assert_eq!(store.get_chunk(&id, 3), None);
        assert_eq!(store.get_chunk(&id, 999), None);
    }

    #[test]
    fn test_unknown_id() {
        let store = store();
        assert_eq!(store.get_chunk("nope", 0), None);
        assert_eq!(store.get_total_chunks("nope"), 0);
        assert_eq!(store.total_bytes("nope"), 0);
    }

    #[test]
    fn test_ids_are_unique() {
        let store = store();
        let a = store.store_chunks(vec!["x".to_string()]);
        let b = store.store_chunks(vec!["x".to_string()]);
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn test_expired_set_reads_as_absent() {
        let store = expired_store();
        let id = store.store_chunks(vec!["gone".to_string()]);
        assert_eq!(store.get_chunk(&id, 0), None);
        assert_eq!(store.get_total_chunks(&id), 0);
    }

    #[test]
    fn test_store_sweeps_expired_entries() {
        let store = expired_store();
        let old = store.store_chunks(vec!["old".to_string()]);
        // The next store runs the sweep and drops the expired set
        let _new = store.store_chunks(vec!["new".to_string()]);
        let sets = store.sets.lock().unwrap();
        assert!(!sets.contains_key(&old));
    }

    #[test]
    fn test_remove() {
        let store = store();
        let id = store.store_chunks(vec!["data".to_string()]);
        assert_eq!(store.get_total_chunks(&id), 1);
        store.remove(&id);
        assert_eq!(store.get_total_chunks(&id), 0);
    }

    #[test]
    fn test_cursor_lookup() {
        let store = store();
        let id = store.store_chunks(vec!["aaaa".to_string(), "bbbb".to_string()]);

        let (index, segment, start) = store.get_chunk_at_cursor(&id, 0).unwrap();
        assert_eq!((index, segment.as_str(), start), (0, "aaaa", 0));

        let (index, segment, start) = store.get_chunk_at_cursor(&id, 4).unwrap();
        assert_eq!((index, segment.as_str(), start), (1, "bbbb", 4));

        // Mid-segment cursors resolve to the containing segment
        let (index, _, start) = store.get_chunk_at_cursor(&id, 6).unwrap();
        assert_eq!((index, start), (1, 4));

        // At or past the end is out of range
        assert!(store.get_chunk_at_cursor(&id, 8).is_none());
        assert!(store.get_chunk_at_cursor(&id, 100).is_none());
    }

    #[test]
    fn test_raw_split_round_trip() {
        let content = "abcdefghij".repeat(100);
        let segments = split_content_into_raw_chunks(&content, 64);
        assert!(segments.len() > 1);
        assert!(segments.iter().all(|s| s.len() <= 64));
        assert_eq!(segments.concat(), content);
    }

    #[test]
    fn test_raw_split_small_content_is_identity() {
        let segments = split_content_into_raw_chunks("hello", 64);
        assert_eq!(segments, vec!["hello".to_string()]);
    }

    #[test]
    fn test_raw_split_empty_content() {
        assert_eq!(split_content_into_raw_chunks("", 64), vec![String::new()]);
    }

    #[test]
    fn test_raw_split_never_splits_multibyte_char() {
        // Three-byte characters with a limit that is not a multiple of three
        let content = "\u{3042}".repeat(100);
        let segments = split_content_into_raw_chunks(&content, 10);
        assert_eq!(segments.concat(), content);
        for segment in &segments {
            assert!(segment.len() <= 10);
            // Each segment holds only whole characters
            assert_eq!(segment.len() % 3, 0);
        }
    }

    #[test]
    fn test_raw_split_char_wider_than_limit() {
        // A char never splits, even when it alone exceeds the limit
        let segments = split_content_into_raw_chunks("\u{1F600}\u{1F600}", 2);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments.concat(), "\u{1F600}\u{1F600}");
    }

    #[test]
    fn test_split_content_into_chunks() {
        let store = store();
        let content = "x".repeat(120_000);
        let split = store
            .split_content_into_chunks(&content, 50_000, 0)
            .unwrap();
        assert_eq!(split.total_bytes, 120_000);
        assert!(split.segments.len() > 2);
        assert_eq!(split.segments.concat(), content);
        // Segment plus worst-case footer stays under the limit
        assert!(split.segments.iter().all(|s| s.len() < 50_000));
    }

    #[test]
    fn test_split_with_offset() {
        let store = store();
        let content = "abcdef";
        let split = store.split_content_into_chunks(content, 50_000, 4).unwrap();
        assert_eq!(split.segments, vec!["ef".to_string()]);
        assert_eq!(split.total_bytes, 6);
    }

    #[test]
    fn test_split_offset_out_of_range() {
        let store = store();
        let err = store
            .split_content_into_chunks("abc", 50_000, 10)
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidCursor { cursor: 10, .. }));
    }

    #[test]
    fn test_split_offset_inside_multibyte_char() {
        let store = store();
        let err = store
            .split_content_into_chunks("\u{3042}bc", 50_000, 1)
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidCursor { .. }));
    }

    #[test]
    fn test_concurrent_store_and_read() {
        let store = Arc::new(store());
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                let id = store.store_chunks(vec![format!("seg-{i}")]);
                assert_eq!(store.get_chunk(&id, 0), Some(format!("seg-{i}")));
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
