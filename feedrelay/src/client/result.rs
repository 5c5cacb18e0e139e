//! Values returned by the client.

use crate::breaker::CircuitSnapshot;
use crate::cache::{CacheStatistics, CacheTier, Payload};
use crate::dedup::DedupStats;
use crate::proxy::ProxyHealthRecord;
use serde::Serialize;
use std::collections::BTreeMap;

/// Where a returned payload came from when it was not freshly fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheSource {
    Memory,
    Storage,
    /// Served because the circuit was open.
    Fallback,
    /// Served because every attempt failed.
    StaleFallback,
}

impl CacheSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Storage => "storage",
            Self::Fallback => "fallback",
            Self::StaleFallback => "stale-fallback",
        }
    }
}

impl From<CacheTier> for CacheSource {
    fn from(tier: CacheTier) -> Self {
        match tier {
            CacheTier::Memory => Self::Memory,
            CacheTier::Storage => Self::Storage,
        }
    }
}

impl std::fmt::Display for CacheSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`ServiceClient::request`](super::ServiceClient::request).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestResult {
    pub data: Payload,
    /// `None` when the payload was fetched by this call.
    pub from_cache: Option<CacheSource>,
    /// Payload is past its TTL.
    pub stale: bool,
    /// Served because the circuit breaker refused the call.
    pub circuit_open: bool,
    /// 0-based index of the attempt that succeeded, for fresh fetches.
    pub attempt: Option<u32>,
    /// Last error, for stale fallbacks.
    pub error: Option<String>,
}

impl RequestResult {
    pub(crate) fn fetched(data: Payload, attempt: u32) -> Self {
        Self {
            data,
            from_cache: None,
            stale: false,
            circuit_open: false,
            attempt: Some(attempt),
            error: None,
        }
    }

    pub(crate) fn cached(data: Payload, source: CacheSource, stale: bool) -> Self {
        Self {
            data,
            from_cache: Some(source),
            stale,
            circuit_open: false,
            attempt: None,
            error: None,
        }
    }

    /// Whether the payload came from the network during this call.
    pub fn is_fresh_fetch(&self) -> bool {
        self.from_cache.is_none()
    }
}

/// Operational snapshot of the client.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub circuit_breakers: BTreeMap<String, CircuitSnapshot>,
    pub open_circuits: usize,
    pub in_flight_requests: usize,
    pub cache_stats: CacheStatistics,
    pub proxies: Vec<ProxyHealthRecord>,
    pub coalescing: DedupStats,
    pub pending_revalidations: usize,
}
