//! Canned-response transport for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::transport::{Transport, TransportError, TransportResponse};
use super::{HttpClient, RetryPolicy};
use crate::scrapers::rate_limiter::{RateLimitConfig, RateLimiter};

/// Serves registered bodies with 200 and everything else with 404.
#[derive(Default)]
pub struct StaticTransport {
    pages: Mutex<HashMap<String, TransportResponse>>,
    requests: Mutex<Vec<String>>,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, body: &str) -> Self {
        self.insert(url, TransportResponse::new(200, url, body.as_bytes().to_vec()));
        self
    }

    pub fn file(self, url: &str, body: &[u8], content_type: &str) -> Self {
        self.insert(
            url,
            TransportResponse::new(200, url, body.to_vec())
                .with_header("content-type", content_type),
        );
        self
    }

    pub fn insert(&self, url: &str, response: TransportResponse) {
        self.pages.lock().unwrap().insert(url.to_string(), response);
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, url: &str) -> usize {
        self.requests().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl Transport for StaticTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(url.to_string());
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| TransportResponse::new(404, url, Vec::new())))
    }
}

/// Client over `transport` with no pacing and a single attempt per URL.
pub fn client(transport: Arc<StaticTransport>) -> HttpClient {
    HttpClient::with_transport(
        transport,
        RateLimiter::with_config(RateLimitConfig::with_base_delay(Duration::ZERO)),
        RetryPolicy {
            max_attempts: 1,
            retry_delay: Duration::ZERO,
        },
    )
}
