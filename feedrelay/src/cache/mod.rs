//! Two-tier cache for fetched payloads.
//!
//! Provides an in-memory tier backed by a durable storage tier, with TTL
//! and stale-while-revalidate semantics and statistics tracking.

mod key;
mod memory;
mod stats;
mod storage;
mod system;
mod r#trait;
mod types;

pub use key::generate_key;
pub use memory::MemoryTier;
pub use r#trait::{EntryStore, NoOpStore};
pub use stats::{CacheStatistics, CacheStats};
pub use storage::StorageTier;
pub use system::CacheManager;
pub use types::{
    CacheConfig, CacheEntry, CacheError, CacheLookup, CacheTier, Payload, DEFAULT_CACHE_PREFIX,
    DEFAULT_MEMORY_ENTRIES, DEFAULT_STORAGE_ENTRIES,
};
