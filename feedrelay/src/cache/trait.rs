//! Storage tier abstraction for dependency injection.

use crate::cache::types::{CacheEntry, CacheError};

/// Durable tier behind the in-memory cache.
///
/// Enables different storage strategies (directory of JSON files, no-op)
/// to be used interchangeably by [`CacheManager`](super::CacheManager).
pub trait EntryStore: Send + Sync {
    /// Read the entry stored for `key`.
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Store or overwrite an entry. Returns the number of entries evicted
    /// to stay within the tier's cap.
    fn put(&self, entry: &CacheEntry) -> Result<usize, CacheError>;

    /// Remove every entry whose key contains `pattern`, returning the
    /// removed keys.
    fn remove_matching(&self, pattern: &str) -> Result<Vec<String>, CacheError>;

    /// Number of stored entries.
    fn len(&self) -> usize;

    /// Whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short name for logs and statistics.
    fn name(&self) -> &str;
}

/// Store that keeps nothing.
///
/// Used for memory-only operation and when caching to disk is disabled.
///
/// # Example
///
/// ```
/// use feedrelay::cache::{CacheEntry, EntryStore, NoOpStore};
/// use std::time::Duration;
///
/// let store = NoOpStore;
/// let entry = CacheEntry::new("k", "v".into(), 0, Duration::from_secs(60), false);
///
/// // Put succeeds but doesn't store
/// store.put(&entry).unwrap();
/// assert!(store.get("k").unwrap().is_none());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpStore;

impl EntryStore for NoOpStore {
    fn get(&self, _key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(None)
    }

    fn put(&self, _entry: &CacheEntry) -> Result<usize, CacheError> {
        Ok(0)
    }

    fn remove_matching(&self, _pattern: &str) -> Result<Vec<String>, CacheError> {
        Ok(Vec::new())
    }

    fn len(&self) -> usize {
        0
    }

    fn name(&self) -> &str {
        "noop"
    }
}
