//! Lazily populated map of per-service breakers.

use super::state::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitStatus};
use crate::time::Clock;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// One [`CircuitBreaker`] per service identifier, created on first use.
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: DashMap::new(),
            clock,
        }
    }

    /// Breaker for `service_id`, created with `config` if absent.
    ///
    /// The configuration of an existing breaker is not changed.
    pub fn get(&self, service_id: &str, config: &CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(service_id) {
            return Arc::clone(existing.value());
        }

        // Entry API so concurrent first callers share one breaker
        self.breakers
            .entry(service_id.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    service_id,
                    *config,
                    Arc::clone(&self.clock),
                ))
            })
            .value()
            .clone()
    }

    /// Snapshot of every known breaker, ordered by service id.
    pub fn status(&self) -> BTreeMap<String, CircuitSnapshot> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }

    /// Number of breakers currently Open.
    pub fn open_count(&self) -> usize {
        self.breakers
            .iter()
            .filter(|entry| entry.value().status() == CircuitStatus::Open)
            .count()
    }

    /// Close every breaker.
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
        info!(breakers = self.breakers.len(), "All circuit breakers reset");
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
