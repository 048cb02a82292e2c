//! Error taxonomy for scraping runs.
//!
//! Errors are split by how far they propagate: most variants are local to a
//! single document or listing page and are logged and skipped, while a few
//! (an unreachable start page, a missing navigation element) end the driver
//! run because no further work can be discovered.

use std::path::PathBuf;

use thiserror::Error;

use crate::render::RenderError;
use crate::scrapers::browser::BrowserError;

/// Errors raised while discovering, fetching and saving documents.
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// Retries exhausted for a single URL.
    #[error("fetch failed for {url} after {attempts} attempts: {last_error}")]
    FetchFailed {
        url: String,
        attempts: u32,
        last_error: String,
    },

    /// The server answered 404; never retried.
    #[error("not found: {url}")]
    NotFound { url: String },

    /// An expected structural element is missing from a page.
    #[error("markup not found on {url}: {what}")]
    MarkupNotFound { url: String, what: String },

    /// A browser automation selector matched nothing.
    #[error("automation element not found on {url}: {selector}")]
    AutomationElementNotFound { url: String, selector: String },

    /// Local filesystem write error.
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The fetched document had no content to persist.
    #[error("empty document at {url}")]
    EmptyDocument { url: String },

    /// The HTML-to-PDF renderer failed.
    #[error("render failed for {url}: {source}")]
    Render {
        url: String,
        #[source]
        source: RenderError,
    },

    /// Browser session failure outside of element lookup.
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    /// The run's entry point could not be reached at all.
    #[error("start page unreachable: {url}: {source}")]
    StartUnreachable {
        url: String,
        #[source]
        source: Box<ScrapeError>,
    },
}

impl ScrapeError {
    /// Build a `MarkupNotFound` for the given page.
    pub fn markup(url: impl Into<String>, what: impl Into<String>) -> Self {
        Self::MarkupNotFound {
            url: url.into(),
            what: what.into(),
        }
    }

    /// Build an `AutomationElementNotFound` for the given page.
    pub fn element(url: impl Into<String>, selector: impl Into<String>) -> Self {
        Self::AutomationElementNotFound {
            url: url.into(),
            selector: selector.into(),
        }
    }

    /// Whether the run can continue past this error when it concerns a
    /// single document.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::StartUnreachable { .. })
    }

    /// Short label used in run summaries and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FetchFailed { .. } => "fetch_failed",
            Self::NotFound { .. } => "not_found",
            Self::MarkupNotFound { .. } => "markup_not_found",
            Self::AutomationElementNotFound { .. } => "automation_element_not_found",
            Self::WriteFailed { .. } => "write_failed",
            Self::EmptyDocument { .. } => "empty_document",
            Self::Render { .. } => "render_failed",
            Self::Browser(_) => "browser",
            Self::StartUnreachable { .. } => "start_unreachable",
        }
    }

    /// URL the error concerns, when it names one.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::FetchFailed { url, .. }
            | Self::NotFound { url }
            | Self::MarkupNotFound { url, .. }
            | Self::AutomationElementNotFound { url, .. }
            | Self::EmptyDocument { url }
            | Self::Render { url, .. }
            | Self::StartUnreachable { url, .. } => Some(url),
            Self::Browser(BrowserError::Navigation { url, .. }) => Some(url),
            Self::WriteFailed { .. } | Self::Browser(_) => None,
        }
    }

    /// Wrap a failure on the first listing page so the run aborts.
    pub fn start_unreachable(url: impl Into<String>, source: ScrapeError) -> Self {
        Self::StartUnreachable {
            url: url.into(),
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_start_unreachable_aborts() {
        let fetch = ScrapeError::FetchFailed {
            url: "https://example.org/a".into(),
            attempts: 3,
            last_error: "timeout".into(),
        };
        assert!(fetch.is_recoverable());
        assert!(ScrapeError::markup("https://example.org", "title").is_recoverable());

        let fatal = ScrapeError::start_unreachable("https://example.org", fetch);
        assert!(!fatal.is_recoverable());
        assert_eq!(fatal.kind(), "start_unreachable");
    }

    #[test]
    fn test_display_names_url() {
        let err = ScrapeError::markup("https://example.org/law/1", "h3 title");
        let msg = err.to_string();
        assert!(msg.contains("https://example.org/law/1"));
        assert!(msg.contains("h3 title"));
    }
}
