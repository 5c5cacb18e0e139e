//! Two-tier cache coordinator.

use crate::cache::memory::MemoryTier;
use crate::cache::r#trait::{EntryStore, NoOpStore};
use crate::cache::storage::StorageTier;
use crate::cache::types::{CacheConfig, CacheEntry, CacheError, CacheLookup, CacheTier, Payload};
use crate::cache::{CacheStatistics, CacheStats};
use crate::time::{Clock, SystemClock};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Two-tier cache coordinating the memory and storage tiers.
///
/// Implements the lookup strategy:
/// 1. Check the memory tier
/// 2. If miss, check the storage tier and promote a hit into memory
/// 3. If miss, the caller fetches and calls [`set`](Self::set)
///
/// Expiry is evaluated lazily on read. Storage tier failures are logged and
/// counted but never surfaced to callers.
///
/// # Example
///
/// ```
/// use feedrelay::cache::{CacheManager, CacheTier, Payload};
/// use feedrelay::time::ManualClock;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = Arc::new(ManualClock::new(0));
/// let cache = CacheManager::memory_only(100, clock.clone());
///
/// cache.set("news", Payload::Text("<rss/>".into()), Duration::from_secs(60), false);
///
/// let hit = cache.get("news").unwrap();
/// assert_eq!(hit.tier, CacheTier::Memory);
/// assert!(!hit.is_stale);
///
/// clock.advance(Duration::from_secs(61));
/// assert!(cache.get("news").unwrap().is_stale);
/// ```
pub struct CacheManager {
    memory: MemoryTier,
    storage: Arc<dyn EntryStore>,
    clock: Arc<dyn Clock>,
    stats: Mutex<CacheStats>,
}

impl CacheManager {
    /// Create a cache from configuration.
    ///
    /// Opens a [`StorageTier`] when caching is enabled and a directory is
    /// configured; otherwise the storage tier is a [`NoOpStore`].
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        let storage: Arc<dyn EntryStore> = match (&config.directory, config.enabled) {
            (Some(dir), true) => {
                if config.prefix.contains(['/', '\\']) {
                    return Err(CacheError::InvalidConfig(format!(
                        "prefix must not contain path separators: {}",
                        config.prefix
                    )));
                }
                let tier = StorageTier::open(dir, config.prefix.clone(), config.storage_entries)?;
                info!(dir = %dir.display(), entries = tier.len(), "Storage tier opened");
                Arc::new(tier)
            }
            _ => Arc::new(NoOpStore),
        };

        Ok(Self::with_store(config.memory_entries, storage, clock))
    }

    /// Create a memory-only cache.
    pub fn memory_only(memory_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self::with_store(memory_entries, Arc::new(NoOpStore), clock)
    }

    /// Create a cache over an explicit storage tier.
    pub fn with_store(
        memory_entries: usize,
        storage: Arc<dyn EntryStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = Self {
            memory: MemoryTier::new(memory_entries),
            storage,
            clock,
            stats: Mutex::new(CacheStats::new()),
        };
        cache.refresh_counts();
        cache
    }

    /// Look up `key`.
    ///
    /// Returns `None` on a miss. Expired entries are returned with
    /// `is_stale` set.
    pub fn get(&self, key: &str) -> Option<CacheLookup> {
        let now = self.clock.now_millis();

        if let Some(entry) = self.memory.get(key) {
            let mut stats = self.stats.lock().unwrap();
            stats.record_memory_hit();
            return Some(Self::lookup(entry, CacheTier::Memory, now, &mut stats));
        }
        self.stats.lock().unwrap().record_memory_miss();

        match self.storage.get(key) {
            Ok(Some(entry)) => {
                // Promote to memory for faster future access
                let evicted = self.memory.put(entry.clone());

                let mut stats = self.stats.lock().unwrap();
                stats.record_storage_hit();
                stats.record_memory_eviction(evicted as u64);
                stats.update_entry_counts(self.memory.entry_count(), self.storage.len());
                debug!(key = key, "Promoted storage tier entry to memory");
                Some(Self::lookup(entry, CacheTier::Storage, now, &mut stats))
            }
            Ok(None) => {
                self.stats.lock().unwrap().record_storage_miss();
                None
            }
            Err(e) => {
                warn!(key = key, store = self.storage.name(), error = %e, "Storage tier read failed");
                let mut stats = self.stats.lock().unwrap();
                stats.record_storage_read_failure();
                stats.record_storage_miss();
                None
            }
        }
    }

    fn lookup(entry: CacheEntry, tier: CacheTier, now: u64, stats: &mut CacheStats) -> CacheLookup {
        let is_stale = entry.is_stale(now);
        if is_stale {
            stats.record_stale_read();
        }
        CacheLookup {
            entry,
            tier,
            is_stale,
        }
    }

    /// Write `value` through to both tiers, overwriting any existing entry.
    pub fn set(&self, key: &str, value: Payload, ttl: Duration, stale_while_revalidate: bool) {
        let entry = CacheEntry::new(
            key,
            value,
            self.clock.now_millis(),
            ttl,
            stale_while_revalidate,
        );

        let storage_result = self.storage.put(&entry);
        let memory_evicted = self.memory.put(entry);

        let mut stats = self.stats.lock().unwrap();
        stats.record_write();
        stats.record_memory_eviction(memory_evicted as u64);
        match storage_result {
            Ok(evicted) => stats.record_storage_eviction(evicted as u64),
            Err(e) => {
                warn!(key = key, store = self.storage.name(), error = %e, "Storage tier write failed");
                stats.record_storage_write_failure();
            }
        }
        stats.update_entry_counts(self.memory.entry_count(), self.storage.len());
    }

    /// Remove every key containing `pattern` from both tiers.
    ///
    /// Returns the number of distinct keys removed. An empty pattern clears
    /// the cache.
    pub fn invalidate(&self, pattern: &str) -> usize {
        let mut removed: HashSet<String> = self.memory.remove_matching(pattern).into_iter().collect();

        match self.storage.remove_matching(pattern) {
            Ok(keys) => removed.extend(keys),
            Err(e) => {
                warn!(pattern = pattern, error = %e, "Storage tier invalidation failed");
            }
        }

        let count = removed.len();
        let mut stats = self.stats.lock().unwrap();
        stats.record_invalidation(count as u64);
        stats.update_entry_counts(self.memory.entry_count(), self.storage.len());
        drop(stats);

        debug!(pattern = pattern, removed = count, "Cache invalidated");
        count
    }

    /// Remove every entry from both tiers.
    pub fn clear(&self) -> usize {
        self.invalidate("")
    }

    /// Combined statistics snapshot.
    pub fn stats(&self) -> CacheStatistics {
        self.refresh_counts();
        let stats = self.stats.lock().unwrap();
        CacheStatistics::from_stats(&stats)
    }

    /// Formatted statistics report.
    pub fn format_stats(&self) -> String {
        self.stats().format(self.storage.name())
    }

    /// Name of the storage tier implementation.
    pub fn storage_name(&self) -> &str {
        self.storage.name()
    }

    fn refresh_counts(&self) {
        let memory = self.memory.entry_count();
        let storage = self.storage.len();
        self.stats
            .lock()
            .unwrap()
            .update_entry_counts(memory, storage);
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::memory_only(
            crate::cache::types::DEFAULT_MEMORY_ENTRIES,
            Arc::new(SystemClock),
        )
    }
}
