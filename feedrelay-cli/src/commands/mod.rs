//! CLI command implementations.
//!
//! # Command Modules
//!
//! - [`cache`] - Cache management (stats, clear)
//! - [`fetch`] - Request an endpoint of a registered service
//! - [`health`] - Client health snapshot
//! - [`proxy`] - Fetch a URL through the relay pool
//! - [`services`] - List configured services and relays

pub mod cache;
pub mod fetch;
pub mod health;
pub mod proxy;
pub mod services;

use crate::error::CliError;
use serde::Serialize;

/// Parse a `key=value` pair.
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
