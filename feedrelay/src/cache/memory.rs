//! In-memory cache tier with oldest-first eviction.

use crate::cache::types::CacheEntry;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory map of cache entries.
///
/// Bounded by entry count; when full, entries with the oldest `stored_at`
/// are evicted first.
pub struct MemoryTier {
    entries: Mutex<HashMap<String, CacheEntry>>,
    max_entries: usize,
}

impl MemoryTier {
    /// Create a new memory tier holding at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Get a copy of the entry stored for `key`.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let entries = self.entries.lock().unwrap();
        entries.get(key).cloned()
    }

    /// Insert or overwrite an entry.
    ///
    /// Returns the number of entries evicted to make room.
    pub fn put(&self, entry: CacheEntry) -> usize {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(entry.key.clone(), entry);
        Self::evict_oldest(&mut entries, self.max_entries)
    }

    /// Remove every entry whose key contains `pattern`.
    pub fn remove_matching(&self, pattern: &str) -> Vec<String> {
        let mut entries = self.entries.lock().unwrap();
        let matched: Vec<String> = entries
            .keys()
            .filter(|key| key.contains(pattern))
            .cloned()
            .collect();

        for key in &matched {
            entries.remove(key);
        }
        matched
    }

    /// Current number of entries.
    pub fn entry_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Configured entry cap.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn evict_oldest(entries: &mut HashMap<String, CacheEntry>, max_entries: usize) -> usize {
        if entries.len() <= max_entries {
            return 0;
        }

        let excess = entries.len() - max_entries;
        let mut by_age: Vec<(u64, String)> = entries
            .values()
            .map(|e| (e.stored_at, e.key.clone()))
            .collect();
        by_age.sort();

        for (_, key) in by_age.into_iter().take(excess) {
            entries.remove(&key);
        }
        excess
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Payload;
    use std::time::Duration;

    fn entry(key: &str, stored_at: u64) -> CacheEntry {
        CacheEntry::new(
            key,
            Payload::Text(format!("value-{}", key)),
            stored_at,
            Duration::from_secs(60),
            false,
        )
    }

    #[test]
    fn test_put_and_get() {
        let tier = MemoryTier::new(10);
        assert!(tier.get("a").is_none());

        tier.put(entry("a", 1));
        let got = tier.get("a").unwrap();
        assert_eq!(got.value, Payload::Text("value-a".into()));
        assert_eq!(tier.entry_count(), 1);
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let tier = MemoryTier::new(10);
        tier.put(entry("a", 1));
        tier.put(entry("a", 2));

        assert_eq!(tier.entry_count(), 1);
        assert_eq!(tier.get("a").unwrap().stored_at, 2);
    }

    #[test]
    fn test_evicts_oldest_stored_at() {
        let tier = MemoryTier::new(2);
        assert_eq!(tier.put(entry("old", 1)), 0);
        assert_eq!(tier.put(entry("mid", 5)), 0);
        assert_eq!(tier.put(entry("new", 9)), 1);

        assert!(tier.get("old").is_none());
        assert!(tier.get("mid").is_some());
        assert!(tier.get("new").is_some());
    }

    #[test]
    fn test_remove_matching_substring() {
        let tier = MemoryTier::new(10);
        tier.put(entry("https://finnhub.io/api/v1/quote|symbol=AAPL", 1));
        tier.put(entry("https://finnhub.io/api/v1/quote|symbol=MSFT", 1));
        tier.put(entry("https://api.stlouisfed.org/fred/series", 1));

        let mut removed = tier.remove_matching("finnhub");
        removed.sort();
        assert_eq!(removed.len(), 2);
        assert_eq!(tier.entry_count(), 1);

        assert!(tier.remove_matching("nothing-matches").is_empty());
    }

    #[test]
    fn test_zero_cap_clamped_to_one() {
        let tier = MemoryTier::new(0);
        assert_eq!(tier.max_entries(), 1);
        tier.put(entry("a", 1));
        assert_eq!(tier.entry_count(), 1);
    }
}
