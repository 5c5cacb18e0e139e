//! Configuration file support.
//!
//! Settings are read from `~/.feedrelay/config.ini` (or an explicit path)
//! and turned into the types the client consumes:
//!
//! ```text
//! config.ini ──► ConfigFile ──┬──► ClientConfig
//!                             ├──► CacheConfig
//!                             ├──► StaticRegistry (services + relay pool)
//!                             └──► LoggingSettings
//! ```
//!
//! # Example
//!
//! ```
//! use feedrelay::config::ConfigFile;
//! use feedrelay::registry::ServiceRegistry;
//!
//! let config = ConfigFile::default();
//! let registry = config.to_registry();
//! assert!(registry.get("finnhub").is_some());
//! ```

mod defaults;
mod duration;
mod file;
mod parser;
mod settings;

pub use defaults::{
    CONFIG_DIRECTORY_NAME, CONFIG_FILE_NAME, DEFAULT_LOG_DIRECTORY_NAME,
    SERVICE_SECTION_PREFIX,
};
pub use duration::{format_duration, parse_duration, DurationParseError};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ConfigFile, LoggingSettings, ProxySettings};
