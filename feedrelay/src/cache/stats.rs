//! Cache statistics tracking and reporting.

use serde::Serialize;
use std::time::Instant;

/// Cache statistics for monitoring and debugging.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    // Memory tier metrics
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub memory_entry_count: usize,
    pub memory_evictions: u64,

    // Storage tier metrics
    pub storage_hits: u64,
    pub storage_misses: u64,
    pub storage_entry_count: usize,
    pub storage_evictions: u64,
    pub storage_write_failures: u64,
    pub storage_read_failures: u64,

    pub writes: u64,
    pub stale_reads: u64,
    pub invalidated: u64,

    #[serde(skip)]
    pub created_at: Instant,
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStats {
    /// Create a new statistics tracker.
    pub fn new() -> Self {
        Self {
            memory_hits: 0,
            memory_misses: 0,
            memory_entry_count: 0,
            memory_evictions: 0,
            storage_hits: 0,
            storage_misses: 0,
            storage_entry_count: 0,
            storage_evictions: 0,
            storage_write_failures: 0,
            storage_read_failures: 0,
            writes: 0,
            stale_reads: 0,
            invalidated: 0,
            created_at: Instant::now(),
        }
    }

    /// Calculate memory tier hit rate (0.0 to 1.0).
    pub fn memory_hit_rate(&self) -> f64 {
        ratio(self.memory_hits, self.memory_hits + self.memory_misses)
    }

    /// Calculate storage tier hit rate (0.0 to 1.0).
    pub fn storage_hit_rate(&self) -> f64 {
        ratio(self.storage_hits, self.storage_hits + self.storage_misses)
    }

    /// Calculate overall hit rate (0.0 to 1.0).
    ///
    /// Every lookup either hits memory, hits storage, or misses storage.
    pub fn overall_hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.storage_hits;
        ratio(hits, hits + self.storage_misses)
    }

    /// Get the uptime duration since statistics started.
    pub fn uptime(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    pub fn record_memory_hit(&mut self) {
        self.memory_hits += 1;
    }

    pub fn record_memory_miss(&mut self) {
        self.memory_misses += 1;
    }

    pub fn record_storage_hit(&mut self) {
        self.storage_hits += 1;
    }

    pub fn record_storage_miss(&mut self) {
        self.storage_misses += 1;
    }

    /// Record a read that returned an expired entry.
    pub fn record_stale_read(&mut self) {
        self.stale_reads += 1;
    }

    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    pub fn record_storage_write_failure(&mut self) {
        self.storage_write_failures += 1;
    }

    pub fn record_storage_read_failure(&mut self) {
        self.storage_read_failures += 1;
    }

    pub fn record_memory_eviction(&mut self, count: u64) {
        self.memory_evictions += count;
    }

    pub fn record_storage_eviction(&mut self, count: u64) {
        self.storage_evictions += count;
    }

    pub fn record_invalidation(&mut self, count: u64) {
        self.invalidated += count;
    }

    /// Update tier entry counts.
    pub fn update_entry_counts(&mut self, memory: usize, storage: usize) {
        self.memory_entry_count = memory;
        self.storage_entry_count = storage;
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Snapshot of cache statistics for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatistics {
    pub stats: CacheStats,
    pub memory_hit_rate_percent: f64,
    pub storage_hit_rate_percent: f64,
    pub overall_hit_rate_percent: f64,
    pub uptime_secs: u64,
}

impl CacheStatistics {
    /// Create a statistics snapshot from current stats.
    pub fn from_stats(stats: &CacheStats) -> Self {
        Self {
            stats: stats.clone(),
            memory_hit_rate_percent: stats.memory_hit_rate() * 100.0,
            storage_hit_rate_percent: stats.storage_hit_rate() * 100.0,
            overall_hit_rate_percent: stats.overall_hit_rate() * 100.0,
            uptime_secs: stats.uptime().as_secs(),
        }
    }

    /// Format statistics as a human-readable string.
    pub fn format(&self, store: &str) -> String {
        let stats = &self.stats;

        format!(
            r#"feedrelay Cache Statistics
Storage: {}

MEMORY TIER
  Entries:     {}
  Hits:        {}
  Misses:      {}
  Hit Rate:    {:.1}%
  Evictions:   {}

STORAGE TIER
  Entries:     {}
  Hits:        {}
  Misses:      {}
  Hit Rate:    {:.1}%
  Evictions:   {}
  Failures:    {} read / {} write

OVERALL
  Writes:      {}
  Stale Reads: {}
  Invalidated: {}
  Hit Rate:    {:.1}%
  Uptime:      {}s
"#,
            store,
            stats.memory_entry_count,
            stats.memory_hits,
            stats.memory_misses,
            self.memory_hit_rate_percent,
            stats.memory_evictions,
            stats.storage_entry_count,
            stats.storage_hits,
            stats.storage_misses,
            self.storage_hit_rate_percent,
            stats.storage_evictions,
            stats.storage_read_failures,
            stats.storage_write_failures,
            stats.writes,
            stats.stale_reads,
            stats.invalidated,
            self.overall_hit_rate_percent,
            self.uptime_secs,
        )
    }
}
