//! Error taxonomy for fetch operations.

use std::time::Duration;
use thiserror::Error;

/// HTTP statuses that will not change on retry.
const TERMINAL_STATUSES: [u16; 3] = [401, 403, 404];

/// Errors surfaced by [`ServiceClient`](crate::client::ServiceClient).
///
/// `Clone` so a single outcome can be broadcast to every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// The registry has no entry for this service identifier.
    #[error("Unknown service: {0}")]
    UnknownService(String),

    /// HTTP-level failure. `status` is `None` when no response arrived
    /// (connection refused, DNS, TLS, body read error).
    #[error("Network error{}: {message}", status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Network {
        status: Option<u16>,
        message: String,
    },

    /// A single attempt exceeded its time budget.
    #[error("Request timed out after {}ms: {url}", timeout.as_millis())]
    Timeout { url: String, timeout: Duration },

    /// The service's circuit breaker rejected the call.
    #[error("Circuit breaker open for service: {service_id}")]
    CircuitOpen { service_id: String },

    /// The upstream answered but the body is unusable.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The endpoint and base URL do not form a valid absolute URL.
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// `fetch_with_proxy` was called with an empty relay pool.
    #[error("No CORS proxies configured")]
    NoProxies,

    /// The producing request was dropped before it settled.
    #[error("Request cancelled before completion")]
    Cancelled,
}

impl FetchError {
    /// Build a network error carrying an HTTP status.
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::Network {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Build a network error with no response.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Network {
            status: None,
            message: message.into(),
        }
    }

    /// HTTP status if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether another attempt within the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { status, .. } => {
                !matches!(status, Some(s) if TERMINAL_STATUSES.contains(s))
            }
            Self::Timeout { .. } | Self::InvalidResponse(_) => true,
            Self::UnknownService(_)
            | Self::InvalidUrl { .. }
            | Self::CircuitOpen { .. }
            | Self::NoProxies
            | Self::Cancelled => false,
        }
    }

    /// Expected relay failures that should not be logged above debug.
    pub fn is_quiet_proxy_failure(&self) -> bool {
        matches!(self, Self::Timeout { .. }) || self.status() == Some(408)
    }
}
