//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use ini::{Ini, Properties};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::defaults::SERVICE_SECTION_PREFIX;
use super::duration::parse_duration;
use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::registry::{CachePolicy, ServiceConfig};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [client] section
    if let Some(section) = ini.section(Some("client")) {
        let client = &mut config.client;
        if let Some(v) = section.get("retries") {
            client.retries = number("client", "retries", v)?;
        }
        if let Some(v) = section.get("timeout") {
            client.timeout = positive_duration("client", "timeout", v)?;
        }
        if let Some(v) = section.get("proxy_timeout") {
            client.proxy_timeout = positive_duration("client", "proxy_timeout", v)?;
        }
        if let Some(v) = section.get("backoff_base") {
            client.backoff_base = duration("client", "backoff_base", v)?;
        }
        if let Some(v) = section.get("backoff_max") {
            client.backoff_max = duration("client", "backoff_max", v)?;
        }
        if let Some(v) = section.get("backoff_jitter") {
            client.backoff_jitter = duration("client", "backoff_jitter", v)?;
        }
        if client.backoff_max < client.backoff_base {
            return Err(invalid(
                "client",
                "backoff_max",
                &super::duration::format_duration(client.backoff_max),
                "must not be smaller than backoff_base",
            ));
        }
    }

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("enabled") {
            config.cache.enabled = parse_bool(v);
        }
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            config.cache.directory = if v.is_empty() || v.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(expand_tilde(v))
            };
        }
        if let Some(v) = section.get("prefix") {
            let v = v.trim();
            if v.is_empty() || v.contains(['/', '\\']) {
                return Err(invalid(
                    "cache",
                    "prefix",
                    v,
                    "must be non-empty and contain no path separators",
                ));
            }
            config.cache.prefix = v.to_string();
        }
        if let Some(v) = section.get("memory_entries") {
            config.cache.memory_entries = positive_number("cache", "memory_entries", v)?;
        }
        if let Some(v) = section.get("storage_entries") {
            config.cache.storage_entries = positive_number("cache", "storage_entries", v)?;
        }
    }

    // [proxies] section
    if let Some(section) = ini.section(Some("proxies")) {
        if let Some(v) = section.get("urls") {
            let urls: Vec<String> = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if let Some(bad) = urls
                .iter()
                .find(|u| !u.starts_with("http://") && !u.starts_with("https://"))
            {
                return Err(invalid("proxies", "urls", bad, "relay URLs must be http(s)"));
            }
            config.proxies.urls = urls;
        }
        if let Some(v) = section.get("quiet_window") {
            config.client.proxy_quiet_window = positive_duration("proxies", "quiet_window", v)?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if v.is_empty() {
                return Err(invalid("logging", "file", v, "must not be empty"));
            }
            config.logging.file = v.to_string();
        }
    }

    // [service.<id>] sections
    for (name, section) in ini.iter() {
        let Some(id) = name.and_then(|n| n.strip_prefix(SERVICE_SECTION_PREFIX)) else {
            continue;
        };
        let section_name = format!("{}{}", SERVICE_SECTION_PREFIX, id);
        if id.is_empty() {
            return Err(invalid(&section_name, "", "", "service id must not be empty"));
        }

        let base = config
            .services
            .remove(id)
            .unwrap_or_else(|| ServiceConfig::new(id, ""));
        let service = parse_service(&section_name, base, section)?;
        config.services.insert(service.id.clone(), service);
    }

    Ok(config)
}

/// Overlay one `[service.<id>]` section onto `service`.
fn parse_service(
    section_name: &str,
    mut service: ServiceConfig,
    section: &Properties,
) -> Result<ServiceConfig, ConfigFileError> {
    if let Some(v) = section.get("base_url") {
        let v = v.trim();
        if !v.is_empty() && url::Url::parse(v).is_err() {
            return Err(invalid(section_name, "base_url", v, "must be an absolute URL"));
        }
        service.base_url = v.trim_end_matches('/').to_string();
    }

    if let Some(v) = section.get("cache_ttl") {
        let ttl = duration(section_name, "cache_ttl", v)?;
        service.cache = if ttl.is_zero() {
            None
        } else {
            let swr = service.cache.is_some_and(|c| c.stale_while_revalidate);
            Some(CachePolicy {
                ttl,
                stale_while_revalidate: swr,
            })
        };
    }
    if let Some(v) = section.get("stale_while_revalidate") {
        let enabled = parse_bool(v);
        match service.cache.as_mut() {
            Some(policy) => policy.stale_while_revalidate = enabled,
            None if enabled => {
                return Err(invalid(
                    section_name,
                    "stale_while_revalidate",
                    v,
                    "requires a non-zero cache_ttl",
                ))
            }
            None => {}
        }
    }

    if let Some(v) = section.get("retries") {
        service.retries = Some(number(section_name, "retries", v)?);
    }
    if let Some(v) = section.get("timeout") {
        service.timeout = Some(positive_duration(section_name, "timeout", v)?);
    }

    let breaker = &mut service.circuit_breaker;
    if let Some(v) = section.get("failure_threshold") {
        breaker.failure_threshold = positive_number(section_name, "failure_threshold", v)?;
    }
    if let Some(v) = section.get("cooldown") {
        breaker.cooldown = duration(section_name, "cooldown", v)?;
    }
    if let Some(v) = section.get("half_open_probes") {
        breaker.half_open_probes = positive_number(section_name, "half_open_probes", v)?;
    }

    Ok(service)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn number<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "must be a non-negative integer"))
}

fn positive_number<T: FromStr + Default + PartialEq>(
    section: &str,
    key: &str,
    value: &str,
) -> Result<T, ConfigFileError> {
    let n: T = value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "must be a positive integer"))?;
    if n == T::default() {
        return Err(invalid(section, key, value, "must be a positive integer"));
    }
    Ok(n)
}

fn duration(section: &str, key: &str, value: &str) -> Result<Duration, ConfigFileError> {
    parse_duration(value).map_err(|_| {
        invalid(
            section,
            key,
            value,
            "expected format like '500ms', '10s', '5m' or '1h'",
        )
    })
}

fn positive_duration(section: &str, key: &str, value: &str) -> Result<Duration, ConfigFileError> {
    let d = duration(section, key, value)?;
    if d.is_zero() {
        return Err(invalid(section, key, value, "must be greater than zero"));
    }
    Ok(d)
}

/// Parse a boolean value from a config string.
/// Accepts: true/false, yes/no, 1/0, on/off (case-insensitive)
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
