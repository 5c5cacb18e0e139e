//! Reliability tracking for CORS relays.

use crate::time::{duration_to_millis, Clock};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Failure rate above which a relay is considered unhealthy.
pub const HEALTH_THRESHOLD: f64 = 0.3;

/// Observations needed before a relay can be judged unhealthy.
pub const MIN_REQUESTS_FOR_HEALTH: u64 = 3;

/// Inactivity after which a relay's counters are cleared.
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Observed reliability of one relay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProxyHealthRecord {
    pub url: String,
    pub success_count: u64,
    pub failure_count: u64,
    /// Epoch millis of the last success.
    pub last_success: Option<u64>,
    /// Epoch millis of the last failure.
    pub last_failure: Option<u64>,
    pub is_healthy: bool,
}

impl ProxyHealthRecord {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            success_count: 0,
            failure_count: 0,
            last_success: None,
            last_failure: None,
            is_healthy: true,
        }
    }

    /// Share of successful requests; 1.0 with no data.
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            1.0
        } else {
            self.success_count as f64 / total as f64
        }
    }

    fn last_activity(&self) -> u64 {
        self.last_success
            .unwrap_or(0)
            .max(self.last_failure.unwrap_or(0))
    }

    fn update_health(&mut self) {
        let total = self.success_count + self.failure_count;
        self.is_healthy = if total < MIN_REQUESTS_FOR_HEALTH {
            true
        } else {
            self.failure_count as f64 / total as f64 <= HEALTH_THRESHOLD
        };
    }
}

/// Scores relays and ranks them healthiest first.
pub struct ProxyHealthTracker {
    records: Mutex<HashMap<String, ProxyHealthRecord>>,
    clock: Arc<dyn Clock>,
    quiet_window: Duration,
}

impl ProxyHealthTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_quiet_window(clock, DEFAULT_QUIET_WINDOW)
    }

    pub fn with_quiet_window(clock: Arc<dyn Clock>, quiet_window: Duration) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            clock,
            quiet_window,
        }
    }

    pub fn record_success(&self, url: &str) {
        let now = self.clock.now_millis();
        let mut records = self.records.lock().unwrap();
        let record = records
            .entry(url.to_string())
            .or_insert_with(|| ProxyHealthRecord::new(url));
        record.success_count += 1;
        record.last_success = Some(now);
        record.update_health();
    }

    pub fn record_failure(&self, url: &str) {
        let now = self.clock.now_millis();
        let mut records = self.records.lock().unwrap();
        let record = records
            .entry(url.to_string())
            .or_insert_with(|| ProxyHealthRecord::new(url));
        record.failure_count += 1;
        record.last_failure = Some(now);
        record.update_health();
    }

    /// Current record for `url`; a fresh healthy record if never seen.
    pub fn health(&self, url: &str) -> ProxyHealthRecord {
        self.records
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| ProxyHealthRecord::new(url))
    }

    /// Rank `urls` healthy-first, then by descending success rate.
    ///
    /// The sort is stable, so ties keep their configured order.
    pub fn sorted_proxies(&self, urls: &[String]) -> Vec<String> {
        let records = self.records.lock().unwrap();
        let score = |url: &str| -> (bool, f64) {
            records
                .get(url)
                .map(|r| (r.is_healthy, r.success_rate()))
                .unwrap_or((true, 1.0))
        };

        let mut ranked: Vec<String> = urls.to_vec();
        ranked.sort_by(|a, b| {
            let (healthy_a, rate_a) = score(a);
            let (healthy_b, rate_b) = score(b);
            healthy_b
                .cmp(&healthy_a)
                .then_with(|| rate_b.partial_cmp(&rate_a).unwrap_or(Ordering::Equal))
        });
        ranked
    }

    /// Clear counters of relays idle for longer than the quiet window.
    pub fn reset_old_health(&self) {
        let now = self.clock.now_millis();
        let window = duration_to_millis(self.quiet_window);
        let mut records = self.records.lock().unwrap();

        for record in records.values_mut() {
            let total = record.success_count + record.failure_count;
            if total > 0 && now.saturating_sub(record.last_activity()) > window {
                debug!(proxy = %record.url, "Resetting idle proxy health");
                record.success_count = 0;
                record.failure_count = 0;
                record.is_healthy = true;
            }
        }
    }

    /// All known records, ordered by URL.
    pub fn snapshot(&self) -> Vec<ProxyHealthRecord> {
        let mut records: Vec<_> = self.records.lock().unwrap().values().cloned().collect();
        records.sort_by(|a, b| a.url.cmp(&b.url));
        records
    }

    pub fn quiet_window(&self) -> Duration {
        self.quiet_window
    }
}
