//! Per-call options and client-wide defaults.

use crate::proxy::DEFAULT_QUIET_WINDOW;
use std::collections::BTreeMap;
use std::time::Duration;

/// Default `Accept` header for direct service requests.
pub const DEFAULT_ACCEPT: &str = "application/json";

/// How a successful body is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// Parse as JSON unless the content type is textual.
    #[default]
    Json,
    /// Always return raw text.
    Text,
}

/// Options for a single [`request`](super::ServiceClient::request) or
/// [`fetch_with_proxy`](super::ServiceClient::fetch_with_proxy) call.
///
/// Unset fields fall back to the service configuration, then to
/// [`ClientConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    /// Query parameters merged into the URL and the cache key.
    pub params: BTreeMap<String, String>,
    /// When false, the cache is not read (it is still written).
    pub use_cache: bool,
    pub retries: Option<u32>,
    pub timeout: Option<Duration>,
    /// `Accept` header override.
    pub accept: Option<String>,
    /// Extra request headers; these win over `accept`.
    pub headers: Vec<(String, String)>,
    pub response_type: ResponseType,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            params: BTreeMap::new(),
            use_cache: true,
            retries: None,
            timeout: None,
            accept: None,
            headers: Vec::new(),
            response_type: ResponseType::Json,
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn text(mut self) -> Self {
        self.response_type = ResponseType::Text;
        self
    }

    /// Headers for the wire: `Accept` first, then caller headers.
    ///
    /// A caller-supplied `Accept` header replaces the computed one.
    pub(crate) fn wire_headers(&self, default_accept: &str) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(self.headers.len() + 1);
        let overridden = self
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("accept"));
        if !overridden {
            let accept = self.accept.as_deref().unwrap_or(default_accept);
            headers.push(("Accept".to_string(), accept.to_string()));
        }
        headers.extend(self.headers.iter().cloned());
        headers
    }
}

/// Client-wide defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Retries after the first attempt (default: 2).
    pub retries: u32,
    /// Per-attempt timeout for service requests (default: 10s).
    pub timeout: Duration,
    /// Per-relay timeout for proxy fetches (default: 15s).
    pub proxy_timeout: Duration,
    /// First retry delay; doubles per attempt (default: 500ms).
    pub backoff_base: Duration,
    /// Upper bound on any retry delay (default: 8s).
    pub backoff_max: Duration,
    /// Exclusive upper bound of the random jitter added to each delay (default: 300ms).
    pub backoff_jitter: Duration,
    /// Minimum pause between relay attempts (default: 200ms).
    pub proxy_stagger_min: Duration,
    /// Maximum pause between relay attempts (default: 300ms).
    pub proxy_stagger_max: Duration,
    /// Idle time after which relay health resets (default: 5m).
    pub proxy_quiet_window: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            timeout: Duration::from_secs(10),
            proxy_timeout: Duration::from_secs(15),
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(8),
            backoff_jitter: Duration::from_millis(300),
            proxy_stagger_min: Duration::from_millis(200),
            proxy_stagger_max: Duration::from_millis(300),
            proxy_quiet_window: DEFAULT_QUIET_WINDOW,
        }
    }
}

impl ClientConfig {
    /// Zero delays everywhere; intended for tests and simulations.
    pub fn without_delays(mut self) -> Self {
        self.backoff_base = Duration::ZERO;
        self.backoff_max = Duration::ZERO;
        self.backoff_jitter = Duration::ZERO;
        self.proxy_stagger_min = Duration::ZERO;
        self.proxy_stagger_max = Duration::ZERO;
        self
    }
}
