//! Single circuit breaker.

use crate::time::{duration_to_millis, Clock};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Thresholds for one service's breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit (default: 5).
    pub failure_threshold: u32,
    /// Time the circuit stays open before probing (default: 60s).
    pub cooldown: Duration,
    /// Concurrent probe requests allowed while half-open (default: 1).
    pub half_open_probes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
            half_open_probes: 1,
        }
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitStatus {
    /// Requests pass through freely.
    Closed,
    /// Requests are rejected until the cooldown elapses.
    Open,
    /// A bounded number of probes test whether the upstream recovered.
    HalfOpen,
}

impl CircuitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of a breaker for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub status: CircuitStatus,
    pub consecutive_failures: u32,
    /// Epoch millis at which the circuit last opened.
    pub opened_at: Option<u64>,
    pub half_open_probes_in_flight: u32,
    pub failure_threshold: u32,
    pub cooldown_ms: u64,
}

#[derive(Debug)]
struct CircuitBreakerInner {
    status: CircuitStatus,
    consecutive_failures: u32,
    opened_at: Option<u64>,
    probes_in_flight: u32,
}

impl CircuitBreakerInner {
    fn new() -> Self {
        Self {
            status: CircuitStatus::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probes_in_flight: 0,
        }
    }
}

/// Outcome of [`CircuitBreaker::track_half_open_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeClaim {
    /// Circuit closed; no slot is involved.
    NotNeeded,
    /// A half-open slot now belongs to the caller.
    Claimed,
    /// Open, or every half-open slot is taken.
    Refused,
}

impl ProbeClaim {
    pub fn is_allowed(self) -> bool {
        self != ProbeClaim::Refused
    }
}

/// Failure-counting circuit breaker for one service.
///
/// Interior mutability via `Mutex`; the lock is never held across an
/// `.await`.
///
/// # Example
///
/// ```
/// use feedrelay::breaker::{CircuitBreaker, CircuitBreakerConfig, ProbeClaim};
/// use feedrelay::time::ManualClock;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = Arc::new(ManualClock::new(0));
/// let config = CircuitBreakerConfig {
///     failure_threshold: 2,
///     cooldown: Duration::from_secs(30),
///     half_open_probes: 1,
/// };
/// let breaker = CircuitBreaker::new("markets", config, clock.clone());
///
/// breaker.record_failure();
/// breaker.record_failure();
/// assert!(!breaker.can_request());
///
/// clock.advance(Duration::from_secs(30));
/// assert!(breaker.can_request());
/// assert_eq!(breaker.track_half_open_request(), ProbeClaim::Claimed);
///
/// breaker.record_success();
/// assert!(breaker.can_request());
/// ```
pub struct CircuitBreaker {
    service_id: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<CircuitBreakerInner>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("service_id", &self.service_id)
            .field("config", &self.config)
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(
        service_id: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            config,
            clock,
            inner: Mutex::new(CircuitBreakerInner::new()),
        }
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether a request may be attempted now.
    ///
    /// An open circuit whose cooldown has elapsed moves to HalfOpen here.
    /// While HalfOpen this is true only if probe slots remain.
    pub fn can_request(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();

        match inner.status {
            CircuitStatus::Closed => true,
            CircuitStatus::Open => {
                let opened_at = inner.opened_at.unwrap_or(0);
                let now = self.clock.now_millis();
                if now.saturating_sub(opened_at) >= duration_to_millis(self.config.cooldown) {
                    inner.status = CircuitStatus::HalfOpen;
                    inner.probes_in_flight = 0;
                    info!(
                        service = %self.service_id,
                        "Circuit breaker cooldown elapsed - half-open"
                    );
                    self.config.half_open_probes > 0
                } else {
                    false
                }
            }
            CircuitStatus::HalfOpen => inner.probes_in_flight < self.config.half_open_probes,
        }
    }

    /// Claim a probe slot before a call goes to the network.
    ///
    /// Only [`ProbeClaim::Claimed`] holds a slot; that caller must settle it
    /// with `record_success`/`record_failure` or give it back with
    /// [`release_half_open_request`](Self::release_half_open_request).
    pub fn track_half_open_request(&self) -> ProbeClaim {
        let mut inner = self.inner.lock().unwrap();

        match inner.status {
            CircuitStatus::Closed => ProbeClaim::NotNeeded,
            CircuitStatus::Open => ProbeClaim::Refused,
            CircuitStatus::HalfOpen => {
                if inner.probes_in_flight < self.config.half_open_probes {
                    inner.probes_in_flight += 1;
                    debug!(
                        service = %self.service_id,
                        probes = inner.probes_in_flight,
                        "Half-open probe claimed"
                    );
                    ProbeClaim::Claimed
                } else {
                    ProbeClaim::Refused
                }
            }
        }
    }

    /// Give back a probe slot claimed by a call that never settled.
    pub fn release_half_open_request(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.status == CircuitStatus::HalfOpen {
            inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
        }
    }

    /// Reset the failure counter and close the circuit.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();

        if inner.status != CircuitStatus::Closed {
            info!(service = %self.service_id, "Circuit breaker closed");
        }
        inner.status = CircuitStatus::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.probes_in_flight = 0;
    }

    /// Count a failure, opening the circuit when the threshold is reached
    /// or when a half-open probe fails.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        let should_open = match inner.status {
            CircuitStatus::HalfOpen => true,
            CircuitStatus::Closed => inner.consecutive_failures >= self.config.failure_threshold,
            CircuitStatus::Open => false,
        };

        if should_open {
            inner.status = CircuitStatus::Open;
            inner.opened_at = Some(self.clock.now_millis());
            inner.probes_in_flight = 0;
            warn!(
                service = %self.service_id,
                failures = inner.consecutive_failures,
                cooldown_ms = duration_to_millis(self.config.cooldown),
                "Circuit breaker opened"
            );
        }
    }

    /// Force the breaker back to Closed.
    pub fn reset(&self) {
        *self.inner.lock().unwrap() = CircuitBreakerInner::new();
    }

    /// Read-only snapshot.
    pub fn state(&self) -> CircuitSnapshot {
        let inner = self.inner.lock().unwrap();
        CircuitSnapshot {
            status: inner.status,
            consecutive_failures: inner.consecutive_failures,
            opened_at: inner.opened_at,
            half_open_probes_in_flight: inner.probes_in_flight,
            failure_threshold: self.config.failure_threshold,
            cooldown_ms: duration_to_millis(self.config.cooldown),
        }
    }

    /// Current status without side effects.
    pub fn status(&self) -> CircuitStatus {
        self.inner.lock().unwrap().status
    }
}
