//! Service configuration types.

use crate::breaker::CircuitBreakerConfig;
use std::time::Duration;

/// Caching behaviour for a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// How long a fetched payload counts as fresh.
    pub ttl: Duration,
    /// Serve expired payloads immediately and refresh in the background.
    pub stale_while_revalidate: bool,
}

impl CachePolicy {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            stale_while_revalidate: false,
        }
    }

    pub fn stale_while_revalidate(mut self) -> Self {
        self.stale_while_revalidate = true;
        self
    }
}

/// Everything the client needs to call one upstream service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Service identifier, e.g. `finnhub`.
    pub id: String,
    /// Prefix joined with relative endpoints. Empty for services that are
    /// always called with absolute URLs.
    pub base_url: String,
    /// `None` disables caching for the service.
    pub cache: Option<CachePolicy>,
    /// Retry count override; client default when `None`.
    pub retries: Option<u32>,
    /// Per-attempt timeout override; client default when `None`.
    pub timeout: Option<Duration>,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl ServiceConfig {
    /// A service with no caching and default breaker thresholds.
    pub fn new(id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            cache: None,
            retries: None,
            timeout: None,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }

    pub fn with_cache(mut self, policy: CachePolicy) -> Self {
        self.cache = Some(policy);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = config;
        self
    }
}
