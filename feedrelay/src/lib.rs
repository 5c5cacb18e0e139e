//! feedrelay - resilient fetching for dashboard data feeds
//!
//! A small substrate between dashboard panels and the third-party APIs and
//! RSS feeds they read from. Every request goes through:
//!
//! - a two-tier cache (memory + on-disk storage) with per-service TTLs and
//!   stale-while-revalidate
//! - a per-service circuit breaker
//! - coalescing of concurrent identical requests
//! - bounded retries with exponential backoff and jitter
//! - for feeds that need it, a pool of CORS relays ranked by health
//!
//! # High-Level API
//!
//! ```no_run
//! use feedrelay::client::{RequestOptions, ServiceClient};
//! use feedrelay::config::ConfigFile;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigFile::load()?;
//! let client = ServiceClient::builder(feedrelay::transport::ReqwestTransport::new()?)
//!     .registry(config.to_registry())
//!     .config(config.client.clone())
//!     .build();
//!
//! let series = client
//!     .request("fred", "/series/observations", RequestOptions::new().param("series_id", "GDP"))
//!     .await?;
//! let feed = client
//!     .fetch_with_proxy("https://example.com/rss.xml", RequestOptions::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod breaker;
pub mod cache;
pub mod client;
pub mod config;
pub mod dedup;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod registry;
pub mod time;
pub mod transport;

pub use client::{RequestOptions, RequestResult, ServiceClient};
pub use error::FetchError;

/// Version of the feedrelay library and CLI.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
