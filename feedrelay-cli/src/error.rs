//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use feedrelay::cache::CacheError;
use feedrelay::config::ConfigFileError;
use feedrelay::FetchError;
use std::fmt;
use std::process;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file could not be loaded
    Config(ConfigFileError),
    /// Cache could not be opened
    Cache(CacheError),
    /// Failed to create the HTTP client
    ClientCreation(FetchError),
    /// A fetch failed after retries and fallbacks
    Fetch(FetchError),
    /// Invalid command-line argument
    InvalidArgument(String),
    /// Failed to render output
    Output(serde_json::Error),
}

impl CliError {
    /// Exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgument(_) | CliError::Config(_) => 2,
            _ => 1,
        }
    }

    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::Fetch(FetchError::CircuitOpen { .. }) => {
                eprintln!();
                eprintln!("The service failed repeatedly and is cooling down.");
                eprintln!("Nothing was cached for this request to fall back on.");
            }
            CliError::Fetch(FetchError::UnknownService(_)) => {
                eprintln!();
                eprintln!("Run 'feedrelay services' to list configured services.");
            }
            CliError::Fetch(FetchError::NoProxies) => {
                eprintln!();
                eprintln!("Add relay URLs to the [proxies] section of config.ini:");
                eprintln!("  urls = https://corsproxy.io/?url=, https://api.allorigins.win/raw?url=");
            }
            _ => {}
        }

        process::exit(self.exit_code())
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "{}", e),
            CliError::Cache(e) => write!(f, "Failed to open cache: {}", e),
            CliError::ClientCreation(e) => write!(f, "Failed to create HTTP client: {}", e),
            CliError::Fetch(e) => write!(f, "{}", e),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Output(e) => write!(f, "Failed to render output: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Cache(e) => Some(e),
            CliError::ClientCreation(e) | CliError::Fetch(e) => Some(e),
            CliError::Output(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<CacheError> for CliError {
    fn from(e: CacheError) -> Self {
        CliError::Cache(e)
    }
}

impl From<FetchError> for CliError {
    fn from(e: FetchError) -> Self {
        CliError::Fetch(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e)
    }
}
