//! `feedrelay services` - list configured services and relays.

use feedrelay::config::{format_duration, ConfigFile};
use feedrelay::registry::{ServiceConfig, ServiceRegistry};

/// Render one service as a table row.
fn service_row(service: &ServiceConfig) -> String {
    let cache = match service.cache {
        Some(policy) if policy.stale_while_revalidate => {
            format!("{} (swr)", format_duration(policy.ttl))
        }
        Some(policy) => format_duration(policy.ttl),
        None => "-".to_string(),
    };
    let timeout = service
        .timeout
        .map(format_duration)
        .unwrap_or_else(|| "default".to_string());
    let retries = service
        .retries
        .map(|r| r.to_string())
        .unwrap_or_else(|| "default".to_string());
    let base = if service.base_url.is_empty() {
        "(absolute URLs)"
    } else {
        service.base_url.as_str()
    };

    format!(
        "{:<14} {:<40} {:<12} {:<8} {:<8} {}/{}",
        service.id,
        base,
        cache,
        retries,
        timeout,
        service.circuit_breaker.failure_threshold,
        format_duration(service.circuit_breaker.cooldown),
    )
}

/// Render the services table and relay list.
pub fn render(config: &ConfigFile) -> String {
    let registry = config.to_registry();
    let mut lines = vec![format!(
        "{:<14} {:<40} {:<12} {:<8} {:<8} {}",
        "SERVICE", "BASE URL", "CACHE", "RETRIES", "TIMEOUT", "BREAKER"
    )];
    for id in registry.service_ids() {
        if let Some(service) = registry.get(&id) {
            lines.push(service_row(&service));
        }
    }

    lines.push(String::new());
    lines.push("Relays (preference order):".to_string());
    let proxies = registry.cors_proxies();
    if proxies.is_empty() {
        lines.push("  (none)".to_string());
    }
    for (i, proxy) in proxies.iter().enumerate() {
        lines.push(format!("  {}. {}", i + 1, proxy));
    }
    lines.join("\n")
}

/// Print the configured services.
pub fn run(config: &ConfigFile) {
    println!("{}", render(config));
}
