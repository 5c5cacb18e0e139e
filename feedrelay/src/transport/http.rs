//! HTTP client abstraction for testability

use crate::error::FetchError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("feedrelay/", env!("CARGO_PKG_VERSION"));

/// A fully read HTTP response.
///
/// Non-2xx responses are returned as values rather than errors so callers
/// can distinguish e.g. a relay's 408 from a hard failure.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Value of the `Content-Type` header, if present.
    pub content_type: Option<String>,
    /// Response body decoded as UTF-8 (lossy).
    pub body: String,
}

impl HttpResponse {
    /// Creates a response with an explicit content type.
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    /// `200 OK` with an `application/json` body.
    pub fn json(body: impl Into<String>) -> Self {
        Self::new(200, Some("application/json"), body)
    }

    /// Response with a `text/plain` body and the given status.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, Some("text/plain"), body)
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for asynchronous HTTP GET.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock transports in tests.
pub trait HttpTransport: Send + Sync {
    /// Performs an async HTTP GET request.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    /// * `headers` - (name, value) pairs added to the request
    /// * `timeout` - Upper bound for the whole request including body read
    ///
    /// # Returns
    ///
    /// The response for any status, or an error when no response could be
    /// obtained.
    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> impl Future<Output = Result<HttpResponse, FetchError>> + Send;
}

/// Transport implementation using reqwest.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a new transport with pooled keep-alive connections.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    /// Creates a new transport that identifies itself as `user_agent`.
    pub fn with_user_agent(user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| FetchError::transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<HttpResponse, FetchError> {
        trace!(url = url, "HTTP GET request starting");

        let mut request = self.client.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = match request.send().await {
            Ok(resp) => {
                debug!(
                    url = url,
                    status = resp.status().as_u16(),
                    "HTTP response received"
                );
                resp
            }
            Err(e) if e.is_timeout() => {
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                    timeout,
                });
            }
            Err(e) => {
                warn!(
                    url = url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_request = e.is_request(),
                    "HTTP request failed"
                );
                return Err(FetchError::transport(format!("Request failed: {}", e)));
            }
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match response.bytes().await {
            Ok(bytes) => {
                trace!(url = url, bytes = bytes.len(), "HTTP response body read");
                Ok(HttpResponse {
                    status,
                    content_type,
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                })
            }
            Err(e) if e.is_timeout() => Err(FetchError::Timeout {
                url: url.to_string(),
                timeout,
            }),
            Err(e) => {
                warn!(url = url, error = %e, "Failed to read response body");
                Err(FetchError::transport(format!(
                    "Failed to read response: {}",
                    e
                )))
            }
        }
    }
}
