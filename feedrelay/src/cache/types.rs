//! Core types for the cache system.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Value stored for a cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Payload {
    /// Parsed JSON document.
    Json(serde_json::Value),
    /// Raw text (RSS, XML, HTML, plain text).
    Text(String),
}

impl Payload {
    /// Borrow the JSON value, if this is a JSON payload.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    /// Borrow the text, if this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Json(_) => None,
        }
    }

    /// Render the payload as a string; JSON is serialised compactly.
    pub fn to_text(&self) -> String {
        match self {
            Self::Json(value) => value.to_string(),
            Self::Text(text) => text.clone(),
        }
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// A cached value with its freshness metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Normalised cache key (see [`generate_key`](super::generate_key)).
    pub key: String,
    /// Cached payload.
    pub value: Payload,
    /// Write time in milliseconds since the Unix epoch.
    pub stored_at: u64,
    /// Time-to-live in milliseconds.
    pub ttl_ms: u64,
    /// Whether an expired entry may be served while a refresh runs.
    pub stale_while_revalidate: bool,
}

impl CacheEntry {
    /// Create an entry stamped at `stored_at`.
    pub fn new(
        key: impl Into<String>,
        value: Payload,
        stored_at: u64,
        ttl: Duration,
        stale_while_revalidate: bool,
    ) -> Self {
        Self {
            key: key.into(),
            value,
            stored_at,
            ttl_ms: crate::time::duration_to_millis(ttl),
            stale_while_revalidate,
        }
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Instant (epoch millis) at which the entry stops being fresh.
    pub fn expires_at(&self) -> u64 {
        self.stored_at.saturating_add(self.ttl_ms)
    }

    /// Whether the entry has outlived its TTL at `now`.
    pub fn is_stale(&self, now: u64) -> bool {
        now >= self.expires_at()
    }

    /// Age of the entry at `now`.
    pub fn age(&self, now: u64) -> Duration {
        Duration::from_millis(now.saturating_sub(self.stored_at))
    }
}

/// Tier that answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    Memory,
    Storage,
}

/// Result of a cache read.
///
/// Expired entries are still returned, flagged stale, so callers can use
/// them as fallbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup {
    pub entry: CacheEntry,
    pub tier: CacheTier,
    pub is_stale: bool,
}

/// Cache-related errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error in the storage tier
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry could not be encoded or decoded
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid cache configuration
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),
}

/// Default file-name prefix for storage tier entries.
pub const DEFAULT_CACHE_PREFIX: &str = "feedrelay-";

/// Default maximum number of entries held in memory.
pub const DEFAULT_MEMORY_ENTRIES: usize = 500;

/// Default maximum number of entries held in the storage tier.
pub const DEFAULT_STORAGE_ENTRIES: usize = 2000;

/// Complete cache system configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// When false, the storage tier is replaced by a no-op store
    pub enabled: bool,
    /// Storage tier directory; `None` runs memory-only
    pub directory: Option<PathBuf>,
    /// File-name prefix for storage tier entries
    pub prefix: String,
    /// Maximum entries kept in memory
    pub memory_entries: usize,
    /// Maximum entries kept in the storage tier
    pub storage_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let directory = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("feedrelay");

        Self {
            enabled: true,
            directory: Some(directory),
            prefix: DEFAULT_CACHE_PREFIX.to_string(),
            memory_entries: DEFAULT_MEMORY_ENTRIES,
            storage_entries: DEFAULT_STORAGE_ENTRIES,
        }
    }
}

impl CacheConfig {
    /// Configuration with no storage tier.
    pub fn memory_only() -> Self {
        Self {
            directory: None,
            ..Self::default()
        }
    }

    /// Set the storage tier directory.
    pub fn with_directory(mut self, dir: PathBuf) -> Self {
        self.directory = Some(dir);
        self
    }

    /// Set the memory entry cap.
    pub fn with_memory_entries(mut self, entries: usize) -> Self {
        self.memory_entries = entries;
        self
    }

    /// Set the storage entry cap.
    pub fn with_storage_entries(mut self, entries: usize) -> Self {
        self.storage_entries = entries;
        self
    }

    /// Set the storage file-name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}
