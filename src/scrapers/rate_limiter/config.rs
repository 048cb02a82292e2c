//! Rate limiter configuration.

use std::time::Duration;

/// Tuning for per-domain request pacing.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Delay between requests to the same domain when not backing off.
    pub base_delay: Duration,
    /// Floor when recovering from backoff.
    pub min_delay: Duration,
    /// Ceiling for backoff.
    pub max_delay: Duration,
    /// Multiplier applied on 429/503.
    pub backoff_multiplier: f64,
    /// Multiplier applied on recovery (< 1.0).
    pub recovery_multiplier: f64,
    /// Consecutive successes before the delay is reduced.
    pub recovery_threshold: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            recovery_multiplier: 0.8,
            recovery_threshold: 5,
        }
    }
}

impl RateLimitConfig {
    /// Default tuning around a different base delay.
    pub fn with_base_delay(base_delay: Duration) -> Self {
        Self {
            base_delay,
            min_delay: base_delay.min(Self::default().min_delay),
            ..Self::default()
        }
    }
}

/// Snapshot of one domain's pacing.
#[derive(Debug, Clone)]
pub struct DomainStats {
    pub current_delay: Duration,
    pub in_backoff: bool,
    pub total_requests: u64,
    pub rate_limit_hits: u64,
}
