//! Relay fetches through the CORS proxy pool.

use super::backoff::stagger_delay;
use super::decode::status_error;
use super::options::RequestOptions;
use super::{ClientInner, ServiceClient};
use crate::error::FetchError;
use crate::proxy::{looks_like_error_page, DEFAULT_PROXY_ACCEPT};
use crate::registry::CORS_PROXY_SERVICE;
use crate::transport::HttpTransport;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::form_urlencoded;

impl<T: HttpTransport + 'static> ServiceClient<T> {
    /// Fetch `target_url` through the relay pool, healthiest relay first.
    ///
    /// Returns the first body that does not look like an error page. Each
    /// relay outcome updates its health record.
    pub async fn fetch_with_proxy(
        &self,
        target_url: &str,
        options: RequestOptions,
    ) -> Result<String, FetchError> {
        let inner = &self.inner;
        let pool = inner.registry.cors_proxies();
        if pool.is_empty() {
            return Err(FetchError::NoProxies);
        }

        inner.proxy_health.reset_old_health();
        let ranked = inner.proxy_health.sorted_proxies(&pool);

        let timeout = options
            .timeout
            .or_else(|| {
                inner
                    .registry
                    .get(CORS_PROXY_SERVICE)
                    .and_then(|service| service.timeout)
            })
            .unwrap_or(inner.config.proxy_timeout);
        let headers = options.wire_headers(DEFAULT_PROXY_ACCEPT);
        let encoded: String = form_urlencoded::byte_serialize(target_url.as_bytes()).collect();

        let mut last_error = FetchError::NoProxies;
        for (index, proxy) in ranked.iter().enumerate() {
            if index > 0 {
                let pause = stagger_delay(
                    inner.config.proxy_stagger_min,
                    inner.config.proxy_stagger_max,
                );
                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
            }

            let relay_url = format!("{}{}", proxy, encoded);
            match inner.relay_once(&relay_url, &headers, timeout).await {
                Ok(body) => {
                    inner.proxy_health.record_success(proxy);
                    info!(proxy = %proxy, upstream = target_url, bytes = body.len(), "Relay fetch succeeded");
                    return Ok(body);
                }
                Err(e) => {
                    inner.proxy_health.record_failure(proxy);
                    if e.is_quiet_proxy_failure() {
                        debug!(proxy = %proxy, upstream = target_url, error = %e, "Relay timed out");
                    } else {
                        warn!(proxy = %proxy, upstream = target_url, error = %e, "Relay fetch failed");
                    }
                    last_error = e;
                }
            }
        }

        warn!(
            upstream = target_url,
            relays = ranked.len(),
            "Every relay failed"
        );
        Err(last_error)
    }
}

impl<T: HttpTransport + 'static> ClientInner<T> {
    async fn relay_once(
        &self,
        relay_url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<String, FetchError> {
        let response =
            match tokio::time::timeout(timeout, self.transport.get(relay_url, headers, timeout))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(FetchError::Timeout {
                        url: relay_url.to_string(),
                        timeout,
                    })
                }
            };

        if !response.is_success() {
            return Err(status_error(response.status, relay_url));
        }
        if looks_like_error_page(&response.body) {
            return Err(FetchError::InvalidResponse(
                "relay returned an error page".to_string(),
            ));
        }
        Ok(response.body)
    }
}
