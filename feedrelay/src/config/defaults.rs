//! Constants for the configuration file layout.

/// Directory under the home directory holding feedrelay's files.
pub const CONFIG_DIRECTORY_NAME: &str = ".feedrelay";

/// Configuration file name inside [`CONFIG_DIRECTORY_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Log directory name inside [`CONFIG_DIRECTORY_NAME`].
pub const DEFAULT_LOG_DIRECTORY_NAME: &str = "logs";

/// Prefix of per-service sections, as in `[service.finnhub]`.
pub const SERVICE_SECTION_PREFIX: &str = "service.";
