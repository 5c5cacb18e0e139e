//! Human-readable duration parsing (e.g., "500ms", "10s", "5m").

use std::time::Duration;
use thiserror::Error;

/// Error parsing a duration string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid duration '{input}' - expected format like '500ms', '10s', '5m' or '1h'")]
pub struct DurationParseError {
    input: String,
}

impl DurationParseError {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Parse a human-readable duration.
///
/// Supports:
/// - Bare numbers (treated as seconds)
/// - `ms`, `s`, `m` and `h` suffixes
/// - Case-insensitive
/// - Whitespace tolerant
///
/// # Examples
///
/// ```
/// use feedrelay::config::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
/// assert_eq!(parse_duration("5 m").unwrap(), Duration::from_secs(300));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, DurationParseError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::new(s));
    }

    let lower = trimmed.to_lowercase();
    // "ms" must be checked before "m" and "s"
    let (num_str, millis_per_unit) = if let Some(n) = lower.strip_suffix("ms") {
        (n, 1_u64)
    } else if let Some(n) = lower.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = lower.strip_suffix('m') {
        (n, 60_000)
    } else if let Some(n) = lower.strip_suffix('h') {
        (n, 3_600_000)
    } else {
        (lower.as_str(), 1_000)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| DurationParseError::new(s))?;

    num.checked_mul(millis_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(|| DurationParseError::new(s))
}

/// Format a duration using the largest unit that divides it evenly.
///
/// ```
/// use feedrelay::config::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(300)), "5m");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
/// ```
pub fn format_duration(duration: Duration) -> String {
    const HOUR: u128 = 3_600_000;
    const MINUTE: u128 = 60_000;
    const SECOND: u128 = 1_000;

    let ms = duration.as_millis();
    if ms >= HOUR && ms % HOUR == 0 {
        format!("{}h", ms / HOUR)
    } else if ms >= MINUTE && ms % MINUTE == 0 {
        format!("{}m", ms / MINUTE)
    } else if ms >= SECOND && ms % SECOND == 0 {
        format!("{}s", ms / SECOND)
    } else {
        format!("{}ms", ms)
    }
}
