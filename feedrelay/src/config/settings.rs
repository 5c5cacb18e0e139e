//! Settings structs for the configuration sections.
//!
//! `[client]` and `[cache]` map directly onto [`ClientConfig`] and
//! [`CacheConfig`]; the remaining sections have their own small structs.

use crate::cache::CacheConfig;
use crate::client::ClientConfig;
use crate::logging::{default_log_dir, default_log_file};
use crate::proxy::DEFAULT_CORS_PROXIES;
use crate::registry::{default_services, ServiceConfig, StaticRegistry};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// `[client]` retry, timeout and backoff defaults
    pub client: ClientConfig,
    /// `[cache]` tier sizes and storage location
    pub cache: CacheConfig,
    /// `[proxies]` relay pool
    pub proxies: ProxySettings,
    /// `[logging]`
    pub logging: LoggingSettings,
    /// Built-in services overlaid with `[service.<id>]` sections
    pub services: BTreeMap<String, ServiceConfig>,
}

/// Relay pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    /// Relay base URLs in preference order; the target URL is appended
    /// percent-encoded.
    pub urls: Vec<String>,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            urls: DEFAULT_CORS_PROXIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: default_log_dir(),
            file: default_log_file().to_string(),
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            cache: CacheConfig::default(),
            proxies: ProxySettings::default(),
            logging: LoggingSettings::default(),
            services: default_services()
                .into_iter()
                .map(|service| (service.id.clone(), service))
                .collect(),
        }
    }
}

impl ConfigFile {
    /// Registry holding every configured service and the relay pool.
    pub fn to_registry(&self) -> StaticRegistry {
        self.services
            .values()
            .cloned()
            .fold(StaticRegistry::builder(), |builder, service| {
                builder.service(service)
            })
            .proxies(self.proxies.urls.iter().cloned())
            .build()
    }
}
