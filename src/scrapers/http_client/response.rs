//! Fetched response wrapper.

use std::collections::HashMap;

use super::transport::TransportResponse;

/// A successful (2xx) response with its body fully read.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// URL that was requested.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
    /// Lower-cased header names.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl FetchedResponse {
    pub(crate) fn from_transport(url: &str, response: TransportResponse) -> Self {
        Self {
            url: url.to_string(),
            final_url: response.final_url,
            status: response.status,
            headers: response.headers,
            body: response.body,
        }
    }

    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }

    /// Body decoded as UTF-8; invalid sequences are replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.body
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
