//! Retry delay schedule.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff with additive jitter and a hard cap.
///
/// The retry after attempt `n` (0-based) waits `base * 2^n` plus a uniform
/// jitter in `[0, jitter)`, never more than `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    pub jitter: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, jitter: Duration) -> Self {
        Self { base, max, jitter }
    }

    /// Delay before the retry following `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter = random_below(self.jitter);
        self.delay_with_jitter(attempt, jitter)
    }

    /// Deterministic form of [`delay`](Self::delay) with an explicit jitter.
    pub fn delay_with_jitter(&self, attempt: u32, jitter: Duration) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let exponential = self.base.saturating_mul(factor);
        exponential.saturating_add(jitter).min(self.max)
    }
}

/// Uniform random duration in `[min, max]`.
pub fn stagger_delay(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    min + random_below(max - min + Duration::from_millis(1)).min(max - min)
}

fn random_below(bound: Duration) -> Duration {
    let bound_ms = u64::try_from(bound.as_millis()).unwrap_or(u64::MAX);
    if bound_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..bound_ms))
}
