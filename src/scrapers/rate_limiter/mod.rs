//! Adaptive per-domain rate limiter.
//!
//! Every request to a host reserves a slot spaced by that host's current
//! delay, which caps the request rate no matter how many workers share the
//! limiter. Backs off on 429/503, gradually recovers on success.

mod config;
mod domain_state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

pub use config::{DomainStats, RateLimitConfig};
use domain_state::DomainState;

/// Adaptive rate limiter that tracks per-domain request timing.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    domains: Arc<RwLock<HashMap<String, DomainState>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            config,
            domains: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Host part of `url`, the key requests are paced by.
    pub fn extract_domain(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|s| s.to_string()))
    }

    /// Wait for this request's slot on the URL's domain.
    ///
    /// Returns the domain so the caller can report the outcome.
    pub async fn acquire(&self, url: &str) -> Option<String> {
        let domain = Self::extract_domain(url)?;

        let wait_time = {
            let mut domains = self.domains.write().await;
            let state = domains
                .entry(domain.clone())
                .or_insert_with(|| DomainState::new(self.config.base_delay));
            let now = Instant::now();
            state.reserve_slot(now).saturating_duration_since(now)
        };

        if wait_time > Duration::ZERO {
            debug!("Rate limiting {}: waiting {:?}", domain, wait_time);
            tokio::time::sleep(wait_time).await;
        }

        Some(domain)
    }

    /// A request went through; enough of these in a row shrink the delay.
    pub async fn report_success(&self, domain: &str) {
        let mut domains = self.domains.write().await;
        if let Some(state) = domains.get_mut(domain) {
            state.consecutive_successes += 1;

            if state.in_backoff && state.consecutive_successes >= self.config.recovery_threshold {
                let new_delay = Duration::from_secs_f64(
                    state.current_delay.as_secs_f64() * self.config.recovery_multiplier,
                );
                state.current_delay = new_delay.max(self.config.min_delay);

                if state.current_delay <= self.config.base_delay {
                    state.in_backoff = false;
                    state.current_delay = self.config.base_delay;
                    info!("Domain {} recovered from rate limit backoff", domain);
                } else {
                    debug!(
                        "Domain {} delay reduced to {:?}",
                        domain, state.current_delay
                    );
                }

                state.consecutive_successes = 0;
            }
        }
    }

    /// 429 and 503 mean the host wants us slower.
    pub fn is_rate_limit(status_code: u16) -> bool {
        matches!(status_code, 429 | 503)
    }

    /// Multiply the host's delay after a 429/503, up to `max_delay`.
    pub async fn report_rate_limit(&self, domain: &str, status_code: u16) {
        let mut domains = self.domains.write().await;
        if let Some(state) = domains.get_mut(domain) {
            state.rate_limit_hits += 1;
            state.consecutive_successes = 0;
            state.in_backoff = true;

            let new_delay = Duration::from_secs_f64(
                state.current_delay.as_secs_f64() * self.config.backoff_multiplier,
            );
            state.current_delay = new_delay.min(self.config.max_delay);

            warn!(
                "Rate limited by {} (HTTP {}), backing off to {:?}",
                domain, status_code, state.current_delay
            );
        }
    }

    /// Other 5xx responses slow the host down by half again.
    pub async fn report_server_error(&self, domain: &str) {
        let mut domains = self.domains.write().await;
        if let Some(state) = domains.get_mut(domain) {
            let new_delay = Duration::from_secs_f64(state.current_delay.as_secs_f64() * 1.5);
            state.current_delay = new_delay.min(self.config.max_delay);
            state.consecutive_successes = 0;
            debug!(
                "Server error for {}, delay increased to {:?}",
                domain, state.current_delay
            );
        }
    }

    /// Route a response status to the matching report.
    pub async fn report_status(&self, domain: &str, status_code: u16) {
        if Self::is_rate_limit(status_code) {
            self.report_rate_limit(domain, status_code).await;
        } else if status_code >= 500 {
            self.report_server_error(domain).await;
        } else if (200..400).contains(&status_code) {
            self.report_success(domain).await;
        }
    }

    /// Pacing snapshot per host.
    pub async fn stats(&self) -> HashMap<String, DomainStats> {
        let domains = self.domains.read().await;
        domains
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    DomainStats {
                        current_delay: v.current_delay,
                        in_backoff: v.in_backoff,
                        total_requests: v.total_requests,
                        rate_limit_hits: v.rate_limit_hits,
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> RateLimitConfig {
        RateLimitConfig {
            base_delay: Duration::from_millis(20),
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            recovery_multiplier: 0.5,
            recovery_threshold: 2,
        }
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            RateLimiter::extract_domain("https://vbpl.vn/TW/Pages/vbpqen.aspx"),
            Some("vbpl.vn".to_string())
        );
        assert_eq!(RateLimiter::extract_domain("not a url"), None);
    }

    #[tokio::test]
    async fn test_backoff_on_rate_limit() {
        let limiter = RateLimiter::with_config(fast_config());
        let domain = limiter.acquire("https://example.org/a").await.unwrap();

        limiter.report_rate_limit(&domain, 429).await;
        let stats = limiter.stats().await;
        let s = &stats["example.org"];
        assert!(s.in_backoff);
        assert_eq!(s.current_delay, Duration::from_millis(40));
        assert_eq!(s.rate_limit_hits, 1);
    }

    #[tokio::test]
    async fn test_recovery_after_successes() {
        let limiter = RateLimiter::with_config(fast_config());
        let domain = limiter.acquire("https://example.org/a").await.unwrap();

        limiter.report_status(&domain, 503).await;
        limiter.report_status(&domain, 200).await;
        limiter.report_status(&domain, 200).await;

        let stats = limiter.stats().await;
        let s = &stats["example.org"];
        assert!(!s.in_backoff);
        assert_eq!(s.current_delay, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_concurrent_acquires_respect_ceiling() {
        let limiter = RateLimiter::with_config(fast_config());
        let start = Instant::now();

        let tasks: Vec<_> = (0..4)
            .map(|i| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter
                        .acquire(&format!("https://example.org/doc/{}", i))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        // Four requests to one host need at least three full delays.
        assert!(start.elapsed() >= Duration::from_millis(60));
        let stats = limiter.stats().await;
        assert_eq!(stats["example.org"].total_requests, 4);
    }

    #[tokio::test]
    async fn test_domains_are_independent() {
        let limiter = RateLimiter::with_config(RateLimitConfig::with_base_delay(
            Duration::from_secs(5),
        ));
        let start = Instant::now();
        limiter.acquire("https://a.example/1").await;
        limiter.acquire("https://b.example/1").await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
