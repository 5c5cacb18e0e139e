//! CORS relay pool support: health ranking and response validation.

mod health;
mod validate;

pub use health::{
    ProxyHealthRecord, ProxyHealthTracker, DEFAULT_QUIET_WINDOW, HEALTH_THRESHOLD,
    MIN_REQUESTS_FOR_HEALTH,
};
pub use validate::looks_like_error_page;

/// Relays tried by default, in preference order.
pub const DEFAULT_CORS_PROXIES: [&str; 4] = [
    "https://corsproxy.io/?url=",
    "https://api.allorigins.win/raw?url=",
    "https://allorigins.win/get?url=",
    "https://api.codetabs.com/v1/proxy?quest=",
];

/// `Accept` header sent through relays unless the caller overrides it.
pub const DEFAULT_PROXY_ACCEPT: &str = "application/rss+xml, application/xml, text/xml, */*";
