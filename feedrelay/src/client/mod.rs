//! Service client: the request orchestrator.
//!
//! Every call flows through the same pipeline:
//!
//! ```text
//! request(service, endpoint, options)
//!   │
//!   ├─► registry lookup ──► UnknownService
//!   ├─► cache (fresh hit, or stale hit + background refresh)
//!   ├─► circuit breaker gate ──► cached fallback / CircuitOpen
//!   ├─► dedup on cache key (concurrent callers share one run)
//!   └─► attempts with backoff ──► cache write
//!                 │
//!                 └─ exhausted ──► breaker failure, stale fallback / error
//! ```
//!
//! The client is a cheap handle around shared state; clone it freely.

mod backoff;
mod decode;
mod options;
mod proxy;
mod result;

pub use backoff::{stagger_delay, Backoff};
pub use decode::{build_url, decode_response};
pub use options::{ClientConfig, RequestOptions, ResponseType, DEFAULT_ACCEPT};
pub use result::{CacheSource, HealthStatus, RequestResult};

use crate::breaker::{CircuitBreaker, CircuitBreakerRegistry, ProbeClaim};
use crate::cache::{generate_key, CacheManager, Payload, DEFAULT_MEMORY_ENTRIES};
use crate::dedup::RequestDeduplicator;
use crate::error::FetchError;
use crate::proxy::ProxyHealthTracker;
use crate::registry::{ServiceConfig, ServiceRegistry, StaticRegistry};
use crate::time::{Clock, SystemClock};
use crate::transport::{HttpTransport, ReqwestTransport};
use decode::status_error;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Resilient client for the registered upstream services.
///
/// # Example
///
/// ```no_run
/// use feedrelay::client::{RequestOptions, ServiceClient};
/// use feedrelay::registry::StaticRegistry;
///
/// # async fn run() -> Result<(), feedrelay::FetchError> {
/// let client = ServiceClient::new(StaticRegistry::with_defaults())?;
/// let result = client
///     .request("finnhub", "/quote", RequestOptions::new().param("symbol", "AAPL"))
///     .await?;
/// println!("{:?} (cache: {:?})", result.data, result.from_cache);
/// # Ok(())
/// # }
/// ```
pub struct ServiceClient<T = ReqwestTransport> {
    inner: Arc<ClientInner<T>>,
}

impl<T> Clone for ServiceClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ClientInner<T> {
    transport: T,
    registry: Arc<dyn ServiceRegistry>,
    cache: CacheManager,
    breakers: CircuitBreakerRegistry,
    dedup: RequestDeduplicator<RequestResult>,
    proxy_health: ProxyHealthTracker,
    config: ClientConfig,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

/// Builder for [`ServiceClient`].
pub struct ServiceClientBuilder<T> {
    transport: T,
    registry: Option<Arc<dyn ServiceRegistry>>,
    cache: Option<CacheManager>,
    config: ClientConfig,
    clock: Option<Arc<dyn Clock>>,
}

impl<T: HttpTransport + 'static> ServiceClientBuilder<T> {
    pub fn registry(mut self, registry: impl ServiceRegistry + 'static) -> Self {
        self.registry = Some(Arc::new(registry));
        self
    }

    pub fn shared_registry(mut self, registry: Arc<dyn ServiceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use a preconfigured cache. It should share the client's clock.
    pub fn cache(mut self, cache: CacheManager) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> ServiceClient<T> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(StaticRegistry::with_defaults()));
        let cache = self
            .cache
            .unwrap_or_else(|| CacheManager::memory_only(DEFAULT_MEMORY_ENTRIES, clock.clone()));

        ServiceClient {
            inner: Arc::new(ClientInner {
                transport: self.transport,
                registry,
                cache,
                breakers: CircuitBreakerRegistry::new(clock.clone()),
                dedup: RequestDeduplicator::new(),
                proxy_health: ProxyHealthTracker::with_quiet_window(
                    clock,
                    self.config.proxy_quiet_window,
                ),
                config: self.config,
                tracker: TaskTracker::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }
}

impl ServiceClient<ReqwestTransport> {
    /// Client over the default reqwest transport with a memory-only cache.
    pub fn new(registry: impl ServiceRegistry + 'static) -> Result<Self, FetchError> {
        Ok(Self::builder(ReqwestTransport::new()?)
            .registry(registry)
            .build())
    }
}

impl<T: HttpTransport + 'static> ServiceClient<T> {
    pub fn builder(transport: T) -> ServiceClientBuilder<T> {
        ServiceClientBuilder {
            transport,
            registry: None,
            cache: None,
            config: ClientConfig::default(),
            clock: None,
        }
    }

    /// Fetch `endpoint` from `service_id`, serving from cache when possible.
    pub async fn request(
        &self,
        service_id: &str,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<RequestResult, FetchError> {
        let inner = &self.inner;
        let service = inner
            .registry
            .get(service_id)
            .ok_or_else(|| FetchError::UnknownService(service_id.to_string()))?;

        let url = build_url(&service.base_url, endpoint, &options.params)?;
        let key = generate_key(&url, std::iter::empty());

        if options.use_cache && service.cache.is_some() {
            if let Some(lookup) = inner.cache.get(&key) {
                let source = CacheSource::from(lookup.tier);
                if !lookup.is_stale {
                    debug!(service = %service.id, key = %key, source = %source, "Cache hit");
                    return Ok(RequestResult::cached(lookup.entry.value, source, false));
                }
                if lookup.entry.stale_while_revalidate {
                    debug!(service = %service.id, key = %key, "Serving stale entry, revalidating");
                    self.spawn_revalidation(service, url, key, options);
                    return Ok(RequestResult::cached(lookup.entry.value, source, true));
                }
            }
        }

        let breaker = inner.breakers.get(&service.id, &service.circuit_breaker);
        if !breaker.can_request() {
            return inner.circuit_open_outcome(&service.id, &key);
        }

        inner
            .coalesced_fetch(&service, &url, &key, &options, &breaker)
            .await
    }

    /// Operational snapshot.
    pub fn health_status(&self) -> HealthStatus {
        let inner = &self.inner;
        HealthStatus {
            circuit_breakers: inner.breakers.status(),
            open_circuits: inner.breakers.open_count(),
            in_flight_requests: inner.dedup.in_flight_count(),
            cache_stats: inner.cache.stats(),
            proxies: inner.proxy_health.snapshot(),
            coalescing: inner.dedup.stats(),
            pending_revalidations: inner.tracker.len(),
        }
    }

    /// Drop cached entries whose key contains `pattern`; returns the count.
    pub fn clear_service_cache(&self, pattern: &str) -> usize {
        let removed = self.inner.cache.invalidate(pattern);
        info!(pattern, removed, "Cleared service cache");
        removed
    }

    /// Close every circuit breaker.
    pub fn reset_circuit_breakers(&self) {
        self.inner.breakers.reset_all();
        info!("Circuit breakers reset");
    }

    /// Cancel background revalidations and in-flight fetches, then wait for
    /// them to wind down.
    ///
    /// Cached entries are still served after shutdown, but stale ones are no
    /// longer refreshed and anything that needs the network fails with
    /// [`FetchError::Cancelled`].
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        self.inner.dedup.wait_idle().await;
        self.inner.dedup.log_stats();
        info!("Service client shut down");
    }

    /// Wait until every background revalidation spawned so far has finished.
    pub async fn wait_for_revalidations(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        if !self.inner.shutdown.is_cancelled() {
            self.inner.tracker.reopen();
        }
    }

    pub fn cache(&self) -> &CacheManager {
        &self.inner.cache
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &dyn ServiceRegistry {
        self.inner.registry.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    fn spawn_revalidation(
        &self,
        service: ServiceConfig,
        url: String,
        key: String,
        options: RequestOptions,
    ) {
        if self.inner.shutdown.is_cancelled() {
            debug!(service = %service.id, "Client shut down - skipping revalidation");
            return;
        }

        let inner = Arc::clone(&self.inner);
        let token = inner.shutdown.clone();
        self.inner.tracker.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(service = %service.id, key = %key, "Revalidation cancelled");
                }
                outcome = inner.revalidate(&service, &url, &key, options) => match outcome {
                    Ok(result) if result.is_fresh_fetch() => {
                        debug!(service = %service.id, key = %key, "Revalidated cache entry");
                    }
                    Ok(_) => {
                        debug!(service = %service.id, key = %key, "Revalidation fell back to cache");
                    }
                    Err(e) => {
                        warn!(service = %service.id, key = %key, error = %e, "Background revalidation failed");
                    }
                },
            }
        });
    }
}

/// Returns a claimed half-open probe slot if the call ends unsettled.
///
/// Armed only for [`ProbeClaim::Claimed`]; a call that needed no slot must
/// never give one back.
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl ProbeGuard<'_> {
    fn settle(&mut self) {
        self.armed = false;
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.release_half_open_request();
        }
    }
}

impl<T: HttpTransport + 'static> ClientInner<T> {
    /// Background refresh: breaker gate, dedup and fetch, never the cache read.
    async fn revalidate(
        self: &Arc<Self>,
        service: &ServiceConfig,
        url: &str,
        key: &str,
        options: RequestOptions,
    ) -> Result<RequestResult, FetchError> {
        let breaker = self.breakers.get(&service.id, &service.circuit_breaker);
        if !breaker.can_request() {
            return Err(FetchError::CircuitOpen {
                service_id: service.id.clone(),
            });
        }

        self.coalesced_fetch(service, url, key, &options, &breaker)
            .await
    }

    /// Run the attempt loop once per key, detached from any single caller.
    ///
    /// Shutdown cancels the run; its subscribers then see `Cancelled`.
    async fn coalesced_fetch(
        self: &Arc<Self>,
        service: &ServiceConfig,
        url: &str,
        key: &str,
        options: &RequestOptions,
        breaker: &Arc<CircuitBreaker>,
    ) -> Result<RequestResult, FetchError> {
        let inner = Arc::clone(self);
        let service = service.clone();
        let url = url.to_string();
        let run_key = key.to_string();
        let options = options.clone();
        let breaker = Arc::clone(breaker);
        let token = self.shutdown.clone();

        self.dedup
            .dedupe(key, move || async move {
                tokio::select! {
                    _ = token.cancelled() => Err(FetchError::Cancelled),
                    outcome = inner.execute(&service, &url, &run_key, &options, &breaker) => outcome,
                }
            })
            .await
    }

    /// Run the attempt loop for one deduplicated call.
    async fn execute(
        &self,
        service: &ServiceConfig,
        url: &str,
        key: &str,
        options: &RequestOptions,
        breaker: &CircuitBreaker,
    ) -> Result<RequestResult, FetchError> {
        // A half-open call is one probe, however many attempts it makes
        let claim = breaker.track_half_open_request();
        if !claim.is_allowed() {
            return self.circuit_open_outcome(&service.id, key);
        }
        let mut probe = ProbeGuard {
            breaker,
            armed: claim == ProbeClaim::Claimed,
        };

        let retries = options
            .retries
            .or(service.retries)
            .unwrap_or(self.config.retries);
        let timeout = options
            .timeout
            .or(service.timeout)
            .unwrap_or(self.config.timeout);
        let headers = options.wire_headers(DEFAULT_ACCEPT);
        let backoff = Backoff::new(
            self.config.backoff_base,
            self.config.backoff_max,
            self.config.backoff_jitter,
        );

        let mut last_error = None;
        for attempt in 0..=retries {
            if attempt > 0 {
                debug!(service = %service.id, attempt, "Retrying request");
            }

            match self
                .fetch_once(url, &headers, timeout, options.response_type)
                .await
            {
                Ok(data) => {
                    probe.settle();
                    breaker.record_success();
                    if let Some(policy) = service.cache {
                        self.cache.set(
                            key,
                            data.clone(),
                            policy.ttl,
                            policy.stale_while_revalidate,
                        );
                    }
                    return Ok(RequestResult::fetched(data, attempt));
                }
                Err(e) => {
                    warn!(
                        service = %service.id,
                        attempt = attempt + 1,
                        max_attempts = retries + 1,
                        error = %e,
                        "Request attempt failed"
                    );
                    let retryable = e.is_retryable();
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                    if attempt < retries {
                        let delay = backoff.delay(attempt);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        probe.settle();
        breaker.record_failure();

        let error = last_error.unwrap_or_else(|| FetchError::transport("no attempts made"));
        if let Some(lookup) = self.cache.get(key) {
            warn!(
                service = %service.id,
                attempts = retries + 1,
                error = %error,
                "All attempts failed - serving stale cache"
            );
            let mut result =
                RequestResult::cached(lookup.entry.value, CacheSource::StaleFallback, lookup.is_stale);
            result.error = Some(error.to_string());
            return Ok(result);
        }

        Err(error)
    }

    /// One network attempt bounded by `timeout`.
    async fn fetch_once(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
        response_type: ResponseType,
    ) -> Result<Payload, FetchError> {
        let response = match tokio::time::timeout(timeout, self.transport.get(url, headers, timeout))
            .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                    timeout,
                })
            }
        };

        if !response.is_success() {
            return Err(status_error(response.status, url));
        }
        decode_response(response, response_type)
    }

    /// Outcome when the breaker refuses a call.
    fn circuit_open_outcome(&self, service_id: &str, key: &str) -> Result<RequestResult, FetchError> {
        match self.cache.get(key) {
            Some(lookup) => {
                debug!(service = service_id, key, "Circuit open - serving cached fallback");
                let mut result =
                    RequestResult::cached(lookup.entry.value, CacheSource::Fallback, lookup.is_stale);
                result.circuit_open = true;
                Ok(result)
            }
            None => Err(FetchError::CircuitOpen {
                service_id: service_id.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::{CircuitBreakerConfig, CircuitStatus};
    use crate::registry::CachePolicy;
    use crate::time::ManualClock;
    use crate::transport::{HttpResponse, MockTransport};
    use serde_json::json;

    fn quotes_service() -> ServiceConfig {
        ServiceConfig::new("quotes", "https://api.example.com/v1")
            .with_cache(CachePolicy::new(Duration::from_secs(60)))
    }

    fn client_with(
        transport: MockTransport,
        services: Vec<ServiceConfig>,
    ) -> (ServiceClient<MockTransport>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let mut registry = StaticRegistry::builder();
        for service in services {
            registry = registry.service(service);
        }
        let client = ServiceClient::builder(transport)
            .registry(registry.build())
            .clock(clock.clone())
            .cache(CacheManager::memory_only(100, clock.clone()))
            .config(ClientConfig::default().without_delays())
            .build();
        (client, clock)
    }

    fn quote_key() -> String {
        generate_key("https://api.example.com/v1/quote?symbol=AAPL", std::iter::empty())
    }

    fn quote_options() -> RequestOptions {
        RequestOptions::new().param("symbol", "AAPL")
    }

    #[tokio::test]
    async fn test_unknown_service() {
        let mock = MockTransport::always(Ok(HttpResponse::json("{}")));
        let (client, _) = client_with(mock.clone(), vec![]);

        let err = client
            .request("missing", "/x", RequestOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::UnknownService("missing".to_string()));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fresh_hit_then_expiry_refetch() {
        let mock = MockTransport::always(Ok(HttpResponse::json(r#"{"c": 189.5}"#)));
        let (client, clock) = client_with(mock.clone(), vec![quotes_service()]);

        let first = client.request("quotes", "/quote", quote_options()).await.unwrap();
        assert!(first.is_fresh_fetch());
        assert_eq!(first.attempt, Some(0));
        assert_eq!(first.data, Payload::Json(json!({"c": 189.5})));
        assert_eq!(mock.urls(), vec!["https://api.example.com/v1/quote?symbol=AAPL"]);

        clock.advance(Duration::from_secs(30));
        let second = client.request("quotes", "/quote", quote_options()).await.unwrap();
        assert_eq!(second.from_cache, Some(CacheSource::Memory));
        assert!(!second.stale);
        assert_eq!(mock.call_count(), 1);

        // Expired without stale-while-revalidate: treated as a miss
        clock.advance(Duration::from_secs(31));
        let third = client.request("quotes", "/quote", quote_options()).await.unwrap();
        assert!(third.is_fresh_fetch());
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_no_cache_skips_read_but_writes() {
        let mock = MockTransport::always(Ok(HttpResponse::json("1")));
        let (client, _) = client_with(mock.clone(), vec![quotes_service()]);

        client
            .request("quotes", "/quote", quote_options().no_cache())
            .await
            .unwrap();
        client
            .request("quotes", "/quote", quote_options().no_cache())
            .await
            .unwrap();
        assert_eq!(mock.call_count(), 2);

        let cached = client.request("quotes", "/quote", quote_options()).await.unwrap();
        assert_eq!(cached.from_cache, Some(CacheSource::Memory));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_uncached_service_always_fetches() {
        let mock = MockTransport::always(Ok(HttpResponse::json("1")));
        let service = ServiceConfig::new("live", "https://live.example.com");
        let (client, _) = client_with(mock.clone(), vec![service]);

        client.request("live", "/tick", RequestOptions::new()).await.unwrap();
        client.request("live", "/tick", RequestOptions::new()).await.unwrap();
        assert_eq!(mock.call_count(), 2);
        assert_eq!(client.cache().stats().stats.writes, 0);
    }

    #[tokio::test]
    async fn test_stale_while_revalidate() {
        let mock = MockTransport::new();
        mock.push(Ok(HttpResponse::json(r#"{"v": 1}"#)))
            .push(Ok(HttpResponse::json(r#"{"v": 2}"#)));
        let service = ServiceConfig::new("quotes", "https://api.example.com/v1").with_cache(
            CachePolicy::new(Duration::from_secs(60)).stale_while_revalidate(),
        );
        let (client, clock) = client_with(mock.clone(), vec![service]);

        client.request("quotes", "/quote", quote_options()).await.unwrap();
        clock.advance(Duration::from_secs(61));

        let stale = client.request("quotes", "/quote", quote_options()).await.unwrap();
        assert!(stale.stale);
        assert_eq!(stale.from_cache, Some(CacheSource::Memory));
        assert_eq!(stale.data, Payload::Json(json!({"v": 1})));

        client.wait_for_revalidations().await;
        assert_eq!(mock.call_count(), 2);

        let refreshed = client.request("quotes", "/quote", quote_options()).await.unwrap();
        assert!(!refreshed.stale);
        assert_eq!(refreshed.data, Payload::Json(json!({"v": 2})));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let mock = MockTransport::new();
        mock.push(Ok(HttpResponse::text(500, "boom")))
            .push(Err(FetchError::transport("connection reset")))
            .push(Ok(HttpResponse::json("42")));
        let (client, _) = client_with(mock.clone(), vec![quotes_service()]);

        let result = client.request("quotes", "/quote", quote_options()).await.unwrap();
        assert_eq!(result.attempt, Some(2));
        assert_eq!(result.data, Payload::Json(json!(42)));
        assert_eq!(mock.call_count(), 3);

        let breaker = &client.health_status().circuit_breakers["quotes"];
        assert_eq!(breaker.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_terminal_status_stops_retrying() {
        let mock = MockTransport::always(Ok(HttpResponse::text(404, "not found")));
        let (client, _) = client_with(mock.clone(), vec![quotes_service()]);

        let err = client
            .request("quotes", "/quote", quote_options())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(mock.call_count(), 1);

        let breaker = &client.health_status().circuit_breakers["quotes"];
        assert_eq!(breaker.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_record_one_failure() {
        let mock = MockTransport::always(Ok(HttpResponse::text(503, "down")));
        let (client, _) = client_with(mock.clone(), vec![quotes_service()]);

        let err = client
            .request("quotes", "/quote", quote_options().retries(3))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(mock.call_count(), 4);

        let breaker = &client.health_status().circuit_breakers["quotes"];
        assert_eq!(breaker.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_stale_fallback_after_failures() {
        let mock = MockTransport::new();
        mock.push(Ok(HttpResponse::json(r#"{"v": "old"}"#)));
        mock.push(Ok(HttpResponse::text(500, "a")))
            .push(Ok(HttpResponse::text(500, "b")))
            .push(Ok(HttpResponse::text(500, "c")));
        let (client, clock) = client_with(mock.clone(), vec![quotes_service()]);

        client.request("quotes", "/quote", quote_options()).await.unwrap();
        clock.advance(Duration::from_secs(120));

        let result = client.request("quotes", "/quote", quote_options()).await.unwrap();
        assert_eq!(result.from_cache, Some(CacheSource::StaleFallback));
        assert!(result.stale);
        assert_eq!(result.data, Payload::Json(json!({"v": "old"})));
        assert!(result.error.unwrap().contains("HTTP 500"));
        assert_eq!(mock.call_count(), 4);
    }

    #[tokio::test]
    async fn test_open_circuit_serves_fallback_without_network() {
        let mock = MockTransport::new();
        let breaker_config = CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_secs(60),
            half_open_probes: 1,
        };
        let service = quotes_service().with_circuit_breaker(breaker_config);
        let (client, clock) = client_with(mock.clone(), vec![service]);

        client.cache().set(
            &quote_key(),
            Payload::Json(json!({"v": "cached"})),
            Duration::from_secs(1),
            false,
        );
        clock.advance(Duration::from_secs(5));

        let breaker = client.inner.breakers.get("quotes", &breaker_config);
        breaker.record_failure();
        assert_eq!(breaker.status(), CircuitStatus::Open);

        let result = client
            .request("quotes", "/quote", quote_options().no_cache())
            .await
            .unwrap();
        assert!(result.circuit_open);
        assert_eq!(result.from_cache, Some(CacheSource::Fallback));
        assert_eq!(result.data, Payload::Json(json!({"v": "cached"})));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_open_circuit_without_cache_errors() {
        let mock = MockTransport::always(Ok(HttpResponse::text(500, "down")));
        let service = ServiceConfig::new("live", "https://live.example.com")
            .with_retries(0)
            .with_circuit_breaker(CircuitBreakerConfig {
                failure_threshold: 2,
                cooldown: Duration::from_secs(60),
                half_open_probes: 1,
            });
        let (client, _) = client_with(mock.clone(), vec![service]);

        for _ in 0..2 {
            client.request("live", "/tick", RequestOptions::new()).await.unwrap_err();
        }
        assert_eq!(client.health_status().open_circuits, 1);

        let err = client
            .request("live", "/tick", RequestOptions::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FetchError::CircuitOpen {
                service_id: "live".to_string()
            }
        );
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_half_open_probe_closes_circuit() {
        let mock = MockTransport::new();
        mock.push(Ok(HttpResponse::text(500, "down")))
            .push(Ok(HttpResponse::json("1")));
        let service = ServiceConfig::new("live", "https://live.example.com")
            .with_retries(0)
            .with_circuit_breaker(CircuitBreakerConfig {
                failure_threshold: 1,
                cooldown: Duration::from_secs(30),
                half_open_probes: 1,
            });
        let (client, clock) = client_with(mock.clone(), vec![service]);

        client.request("live", "/tick", RequestOptions::new()).await.unwrap_err();
        assert_eq!(client.health_status().open_circuits, 1);

        clock.advance(Duration::from_secs(30));
        let result = client.request("live", "/tick", RequestOptions::new()).await.unwrap();
        assert!(result.is_fresh_fetch());
        assert_eq!(client.health_status().open_circuits, 0);
        assert_eq!(
            client.health_status().circuit_breakers["live"].status,
            CircuitStatus::Closed
        );
    }

    #[tokio::test]
    async fn test_failed_probe_reopens_circuit() {
        let mock = MockTransport::always(Ok(HttpResponse::text(502, "bad gateway")));
        let service = ServiceConfig::new("live", "https://live.example.com").with_circuit_breaker(
            CircuitBreakerConfig {
                failure_threshold: 1,
                cooldown: Duration::from_secs(30),
                half_open_probes: 1,
            },
        );
        let (client, clock) = client_with(mock.clone(), vec![service]);

        client
            .request("live", "/tick", RequestOptions::new().retries(0))
            .await
            .unwrap_err();
        clock.advance(Duration::from_secs(30));

        // The probe call makes all its attempts before the circuit reopens
        client
            .request("live", "/tick", RequestOptions::new().retries(2))
            .await
            .unwrap_err();
        assert_eq!(mock.call_count(), 4);
        assert_eq!(
            client.health_status().circuit_breakers["live"].status,
            CircuitStatus::Open
        );
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_coalesce() {
        let mock = MockTransport::always(Ok(HttpResponse::json(r#"{"v": 7}"#)))
            .with_delay(Duration::from_millis(50));
        let (client, _) = client_with(mock.clone(), vec![quotes_service()]);

        let calls = (0..5).map(|_| client.request("quotes", "/quote", quote_options()));
        let results = futures::future::join_all(calls).await;

        assert_eq!(mock.call_count(), 1);
        for result in results {
            assert_eq!(result.unwrap().data, Payload::Json(json!({"v": 7})));
        }
        let coalescing = client.health_status().coalescing;
        assert_eq!(coalescing.coalesced_requests, 4);
        assert_eq!(client.health_status().in_flight_requests, 0);
    }

    #[tokio::test]
    async fn test_distinct_params_get_distinct_entries() {
        let mock = MockTransport::new();
        mock.push(Ok(HttpResponse::json(r#"{"who": "two-params"}"#)))
            .push(Ok(HttpResponse::json(r#"{"who": "one-param"}"#)));
        let (client, _) = client_with(mock.clone(), vec![quotes_service()]);

        client
            .request("quotes", "/q", RequestOptions::new().param("a", "1").param("b", "2"))
            .await
            .unwrap();
        let joined = client
            .request("quotes", "/q", RequestOptions::new().param("a", "1&b=2"))
            .await
            .unwrap();

        assert!(joined.is_fresh_fetch());
        assert_eq!(joined.data, Payload::Json(json!({"who": "one-param"})));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_coalesced_waiter_outlives_first_caller() {
        let mock = MockTransport::always(Ok(HttpResponse::json(r#"{"v": 3}"#)))
            .with_delay(Duration::from_millis(200));
        let (client, _) = client_with(mock.clone(), vec![quotes_service()]);

        let first = tokio::time::timeout(
            Duration::from_millis(50),
            client.request("quotes", "/quote", quote_options()),
        );
        let second = client.request("quotes", "/quote", quote_options());
        let (first, second) = tokio::join!(first, second);

        assert!(first.is_err());
        assert_eq!(second.unwrap().data, Payload::Json(json!({"v": 3})));
        assert_eq!(mock.call_count(), 1);

        let cached = client.request("quotes", "/quote", quote_options()).await.unwrap();
        assert_eq!(cached.from_cache, Some(CacheSource::Memory));
    }

    #[tokio::test]
    async fn test_abandoned_call_still_records_failure() {
        let mock = MockTransport::always(Ok(HttpResponse::text(503, "down")))
            .with_delay(Duration::from_millis(100));
        let (client, _) = client_with(mock.clone(), vec![quotes_service()]);

        let gave_up = tokio::time::timeout(
            Duration::from_millis(20),
            client.request("quotes", "/quote", quote_options().retries(0)),
        )
        .await;
        assert!(gave_up.is_err());

        client.inner.dedup.wait_idle().await;
        assert_eq!(
            client.health_status().circuit_breakers["quotes"].consecutive_failures,
            1
        );
    }

    #[tokio::test]
    async fn test_closed_call_never_frees_a_probe_slot() {
        let mock = MockTransport::always(Ok(HttpResponse::json("1")))
            .with_delay(Duration::from_secs(60));
        let breaker_config = CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_secs(10),
            half_open_probes: 1,
        };
        let service = quotes_service().with_circuit_breaker(breaker_config);
        let (client, clock) = client_with(mock.clone(), vec![service]);

        // Starts while Closed, so it claims no slot
        let slow = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .request(
                        "quotes",
                        "/quote",
                        quote_options().retries(0).timeout(Duration::from_secs(120)),
                    )
                    .await
            })
        };
        while mock.call_count() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let breaker = client.inner.breakers.get("quotes", &breaker_config);
        breaker.record_failure();
        clock.advance(Duration::from_secs(10));
        assert!(breaker.can_request());
        assert_eq!(breaker.track_half_open_request(), ProbeClaim::Claimed);

        client.shutdown().await;
        assert_eq!(slow.await.unwrap().unwrap_err(), FetchError::Cancelled);

        assert_eq!(breaker.state().half_open_probes_in_flight, 1);
        assert!(!breaker.can_request());
    }

    #[tokio::test]
    async fn test_attempt_timeout() {
        let mock = MockTransport::always(Ok(HttpResponse::json("1")))
            .with_delay(Duration::from_millis(500));
        let (client, _) = client_with(mock.clone(), vec![quotes_service()]);

        let err = client
            .request(
                "quotes",
                "/quote",
                quote_options().retries(0).timeout(Duration::from_millis(20)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { timeout, .. } if timeout == Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_timeout_and_header_precedence() {
        let mock = MockTransport::always(Ok(HttpResponse::json("1")));
        let service = quotes_service().with_timeout(Duration::from_secs(3));
        let (client, _) = client_with(mock.clone(), vec![service]);

        client.request("quotes", "/quote", quote_options()).await.unwrap();
        assert_eq!(mock.last_timeout(), Some(Duration::from_secs(3)));
        assert_eq!(
            mock.last_headers(),
            vec![("Accept".to_string(), "application/json".to_string())]
        );

        client
            .request(
                "quotes",
                "/other",
                RequestOptions::new()
                    .timeout(Duration::from_millis(750))
                    .accept("text/csv"),
            )
            .await
            .unwrap();
        assert_eq!(mock.last_timeout(), Some(Duration::from_millis(750)));
        assert_eq!(mock.last_headers()[0].1, "text/csv");
    }

    #[tokio::test]
    async fn test_invalid_json_is_retried() {
        let mock = MockTransport::new();
        mock.push(Ok(HttpResponse::json("<oops")))
            .push(Ok(HttpResponse::json(r#"{"ok": true}"#)));
        let (client, _) = client_with(mock.clone(), vec![quotes_service()]);

        let result = client.request("quotes", "/quote", quote_options()).await.unwrap();
        assert_eq!(result.attempt, Some(1));
    }

    #[tokio::test]
    async fn test_clear_cache_and_reset_breakers() {
        let mock = MockTransport::always(Ok(HttpResponse::json("1")));
        let (client, _) = client_with(mock.clone(), vec![quotes_service()]);

        client.request("quotes", "/quote", quote_options()).await.unwrap();
        client
            .request("quotes", "/quote", RequestOptions::new().param("symbol", "MSFT"))
            .await
            .unwrap();

        assert_eq!(client.clear_service_cache("symbol=AAPL"), 1);
        client.request("quotes", "/quote", quote_options()).await.unwrap();
        assert_eq!(mock.call_count(), 3);

        client
            .inner
            .breakers
            .get("quotes", &CircuitBreakerConfig::default())
            .record_failure();
        client.reset_circuit_breakers();
        assert_eq!(
            client.health_status().circuit_breakers["quotes"].consecutive_failures,
            0
        );
    }

    #[tokio::test]
    async fn test_shutdown_cancels_revalidation() {
        let mock = MockTransport::always(Ok(HttpResponse::json("2")))
            .with_delay(Duration::from_secs(30));
        let service = ServiceConfig::new("quotes", "https://api.example.com/v1").with_cache(
            CachePolicy::new(Duration::from_secs(60)).stale_while_revalidate(),
        );
        let (client, clock) = client_with(mock.clone(), vec![service]);

        client
            .cache()
            .set(&quote_key(), Payload::Json(json!(1)), Duration::from_secs(60), true);
        clock.advance(Duration::from_secs(90));

        let stale = client.request("quotes", "/quote", quote_options()).await.unwrap();
        assert!(stale.stale);
        assert_eq!(client.health_status().pending_revalidations, 1);

        tokio::time::timeout(Duration::from_secs(5), client.shutdown())
            .await
            .expect("shutdown should not wait for the slow refresh");
        assert_eq!(client.health_status().pending_revalidations, 0);

        // Still serves stale data, but no longer refreshes
        let again = client.request("quotes", "/quote", quote_options()).await.unwrap();
        assert!(again.stale);
        assert_eq!(client.health_status().pending_revalidations, 0);
    }
}
