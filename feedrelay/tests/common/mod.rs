//! Shared helpers for integration tests.

#![allow(dead_code)]

use feedrelay::cache::CacheManager;
use feedrelay::client::{ClientConfig, ServiceClient};
use feedrelay::registry::StaticRegistry;
use feedrelay::time::ManualClock;
use feedrelay::transport::{HttpResponse, HttpTransport};
use feedrelay::FetchError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Handler = dyn Fn(&str, usize) -> Result<HttpResponse, FetchError> + Send + Sync;

/// Transport answering through a handler given the URL and the 0-based call
/// index.
#[derive(Clone)]
pub struct HandlerTransport {
    handler: Arc<Handler>,
    calls: Arc<AtomicUsize>,
    urls: Arc<Mutex<Vec<String>>>,
    delay: Duration,
}

impl HandlerTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, usize) -> Result<HttpResponse, FetchError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            calls: Arc::new(AtomicUsize::new(0)),
            urls: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl HttpTransport for HandlerTransport {
    async fn get(
        &self,
        url: &str,
        _headers: &[(String, String)],
        _timeout: Duration,
    ) -> Result<HttpResponse, FetchError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.handler)(url, index)
    }
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(1_700_000_000_000))
}

/// Client with no retry delays, a manual clock and a memory-only cache.
pub fn client(
    transport: HandlerTransport,
    registry: StaticRegistry,
    clock: Arc<ManualClock>,
) -> ServiceClient<HandlerTransport> {
    ServiceClient::builder(transport)
        .registry(registry)
        .clock(clock.clone())
        .cache(CacheManager::memory_only(100, clock))
        .config(ClientConfig::default().without_delays())
        .build()
}
