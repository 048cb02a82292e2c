//! HTTP fetcher with retries, per-domain pacing and a uniform status policy.
//!
//! Status policy: 2xx succeeds, 404 is a terminal skip, every other status
//! and every transport error is retried until the attempt budget runs out.

#[cfg(test)]
pub(crate) mod fake;
mod response;
mod transport;
mod user_agent;

pub use response::FetchedResponse;
pub use transport::{ReqwestTransport, Transport, TransportError, TransportResponse};
pub use user_agent::{resolve_user_agent, BROWSER_USER_AGENTS, USER_AGENT};

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::rate_limiter::{RateLimitConfig, RateLimiter};
use crate::error::ScrapeError;

/// How many times to try a URL and how long to wait between tries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay after the first failed attempt; grows linearly per attempt.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 9,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    fn delay_after(&self, attempt: u32) -> Duration {
        self.retry_delay * attempt
    }
}

/// Fetcher shared by every driver in a run.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    rate_limiter: RateLimiter,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Create a reqwest-backed client.
    pub fn new(
        timeout: Duration,
        request_delay: Duration,
        user_agent_config: Option<&str>,
    ) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(timeout, user_agent_config)?;
        Ok(Self::with_transport(
            Arc::new(transport),
            RateLimiter::with_config(RateLimitConfig::with_base_delay(request_delay)),
            RetryPolicy::default(),
        ))
    }

    /// Create a client over any transport.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        rate_limiter: RateLimiter,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            rate_limiter,
            retry,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Get the rate limiter for this client.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// GET a URL under the retry and status policy.
    pub async fn get(&self, url: &str) -> Result<FetchedResponse, ScrapeError> {
        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let domain = self.rate_limiter.acquire(url).await;

            match self.transport.get(url).await {
                Ok(response) => {
                    let status = response.status;
                    if let Some(ref domain) = domain {
                        self.rate_limiter.report_status(domain, status).await;
                    }

                    if status == 404 {
                        debug!("404 for {}, not retrying", url);
                        return Err(ScrapeError::NotFound {
                            url: url.to_string(),
                        });
                    }
                    if (200..300).contains(&status) {
                        return Ok(FetchedResponse::from_transport(url, response));
                    }
                    last_error = format!("HTTP {}", status);
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            if attempt < attempts {
                debug!(
                    "Attempt {}/{} for {} failed ({}), retrying",
                    attempt, attempts, url, last_error
                );
                tokio::time::sleep(self.retry.delay_after(attempt)).await;
            }
        }

        warn!(
            "Giving up on {} after {} attempts: {}",
            url, attempts, last_error
        );
        Err(ScrapeError::FetchFailed {
            url: url.to_string(),
            attempts,
            last_error,
        })
    }

    /// GET a page and decode it as text.
    pub async fn get_text(&self, url: &str) -> Result<String, ScrapeError> {
        Ok(self.get(url).await?.text())
    }
}
