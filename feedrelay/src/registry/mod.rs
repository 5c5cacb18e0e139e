//! Service registry: static per-service configuration and the relay pool.

mod types;

pub use types::{CachePolicy, ServiceConfig};

use crate::proxy::DEFAULT_CORS_PROXIES;
use std::collections::BTreeMap;
use std::time::Duration;

/// Identifier of the service whose timeout applies to relay fetches.
pub const CORS_PROXY_SERVICE: &str = "cors-proxy";

/// Lookup of service configuration.
///
/// Implementations must be cheap to query; the client calls `get` on every
/// request.
pub trait ServiceRegistry: Send + Sync {
    /// Configuration for `id`, or `None` if unknown.
    fn get(&self, id: &str) -> Option<ServiceConfig>;

    /// Relay base URLs in configured preference order.
    fn cors_proxies(&self) -> Vec<String>;

    /// Known service identifiers, sorted.
    fn service_ids(&self) -> Vec<String>;
}

/// Immutable in-memory registry.
///
/// # Example
///
/// ```
/// use feedrelay::registry::{CachePolicy, ServiceConfig, ServiceRegistry, StaticRegistry};
/// use std::time::Duration;
///
/// let registry = StaticRegistry::builder()
///     .service(
///         ServiceConfig::new("quotes", "https://api.example.com")
///             .with_cache(CachePolicy::new(Duration::from_secs(60))),
///     )
///     .proxies(["https://relay.example.com/?url="])
///     .build();
///
/// assert!(registry.get("quotes").is_some());
/// assert_eq!(registry.cors_proxies().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    services: BTreeMap<String, ServiceConfig>,
    proxies: Vec<String>,
}

impl StaticRegistry {
    pub fn builder() -> StaticRegistryBuilder {
        StaticRegistryBuilder::default()
    }

    /// Registry with the built-in services and relay pool.
    pub fn with_defaults() -> Self {
        let mut builder = Self::builder().proxies(DEFAULT_CORS_PROXIES);
        for service in default_services() {
            builder = builder.service(service);
        }
        builder.build()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl ServiceRegistry for StaticRegistry {
    fn get(&self, id: &str) -> Option<ServiceConfig> {
        self.services.get(id).cloned()
    }

    fn cors_proxies(&self) -> Vec<String> {
        self.proxies.clone()
    }

    fn service_ids(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }
}

/// Builder for [`StaticRegistry`].
#[derive(Debug, Default)]
pub struct StaticRegistryBuilder {
    services: BTreeMap<String, ServiceConfig>,
    proxies: Vec<String>,
}

impl StaticRegistryBuilder {
    /// Add or replace a service.
    pub fn service(mut self, config: ServiceConfig) -> Self {
        self.services.insert(config.id.clone(), config);
        self
    }

    /// Replace the relay pool.
    pub fn proxies<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.proxies = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> StaticRegistry {
        StaticRegistry {
            services: self.services,
            proxies: self.proxies,
        }
    }
}

/// Built-in services.
///
/// - `finnhub`: market quotes, 60s cache
/// - `fred`: economic series, 10m cache, stale-while-revalidate
/// - `news`: feeds called by absolute URL, 5m cache, stale-while-revalidate
/// - `cors-proxy`: relay settings (15s timeout, no cache)
pub fn default_services() -> Vec<ServiceConfig> {
    vec![
        ServiceConfig::new("finnhub", "https://finnhub.io/api/v1")
            .with_cache(CachePolicy::new(Duration::from_secs(60))),
        ServiceConfig::new("fred", "https://api.stlouisfed.org/fred").with_cache(
            CachePolicy::new(Duration::from_secs(10 * 60)).stale_while_revalidate(),
        ),
        ServiceConfig::new("news", "").with_cache(
            CachePolicy::new(Duration::from_secs(5 * 60)).stale_while_revalidate(),
        ),
        ServiceConfig::new(CORS_PROXY_SERVICE, "").with_timeout(Duration::from_secs(15)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_registered() {
        let registry = StaticRegistry::with_defaults();

        assert_eq!(
            registry.service_ids(),
            vec!["cors-proxy", "finnhub", "fred", "news"]
        );
        assert_eq!(registry.cors_proxies()[0], "https://corsproxy.io/?url=");
        assert_eq!(registry.cors_proxies().len(), 4);

        let finnhub = registry.get("finnhub").unwrap();
        assert_eq!(finnhub.base_url, "https://finnhub.io/api/v1");
        assert_eq!(finnhub.cache.unwrap().ttl, Duration::from_secs(60));
        assert!(!finnhub.cache.unwrap().stale_while_revalidate);

        let proxy = registry.get(CORS_PROXY_SERVICE).unwrap();
        assert_eq!(proxy.timeout, Some(Duration::from_secs(15)));
        assert!(proxy.cache.is_none());
    }

    #[test]
    fn test_unknown_service() {
        let registry = StaticRegistry::with_defaults();
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_builder_replaces_duplicate_ids() {
        let registry = StaticRegistry::builder()
            .service(ServiceConfig::new("a", "https://one"))
            .service(ServiceConfig::new("a", "https://two"))
            .build();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").unwrap().base_url, "https://two");
        assert!(registry.cors_proxies().is_empty());
    }

    #[test]
    fn test_usable_as_trait_object() {
        let registry: std::sync::Arc<dyn ServiceRegistry> =
            std::sync::Arc::new(StaticRegistry::with_defaults());
        assert!(registry.get("fred").is_some());
    }
}
