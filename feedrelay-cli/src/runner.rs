//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization and client creation
//! so command handlers stay small.

use crate::error::CliError;
use feedrelay::cache::CacheManager;
use feedrelay::client::ServiceClient;
use feedrelay::config::ConfigFile;
use feedrelay::logging::{init_logging, LoggingGuard};
use feedrelay::time::SystemClock;
use feedrelay::transport::ReqwestTransport;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Load config (explicit path or `~/.feedrelay/config.ini`) and start
    /// logging.
    ///
    /// With `debug_mode`, debug-level logs are also mirrored to stderr.
    pub fn new(config_path: Option<&Path>, debug_mode: bool) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };

        let logging_guard = init_logging(
            &config.logging.directory,
            &config.logging.file,
            debug_mode,
            debug_mode,
        )
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!(version = feedrelay::VERSION, command, "feedrelay CLI starting");
    }

    /// Open the cache described by the config.
    pub fn open_cache(&self) -> Result<CacheManager, CliError> {
        Ok(CacheManager::new(&self.config.cache, Arc::new(SystemClock))?)
    }

    /// Build a client over the configured services, relays and cache.
    pub fn create_client(&self) -> Result<ServiceClient, CliError> {
        let clock = Arc::new(SystemClock);
        let cache = CacheManager::new(&self.config.cache, clock.clone())?;
        let transport = ReqwestTransport::new().map_err(CliError::ClientCreation)?;

        let client = ServiceClient::builder(transport)
            .registry(self.config.to_registry())
            .clock(clock)
            .cache(cache)
            .config(self.config.client.clone())
            .build();
        info!(storage = client.cache().storage_name(), "Service client created");
        Ok(client)
    }
}
