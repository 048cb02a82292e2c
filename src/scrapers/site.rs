//! Driver traits and the values they exchange with the crawl engine.

use async_trait::async_trait;

use super::browser::BrowserSession;
use super::context::{RunContext, RunSummary};
use super::markup::Markup;
use super::pagination::Pagination;
use crate::error::ScrapeError;
use crate::models::ExtraFields;
use crate::services::SaveOutcome;

/// Identity of a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteInfo {
    /// Name used on the command line.
    pub name: String,
    /// Country recorded in every ledger entry.
    pub country: String,
    /// Default document language.
    pub language: String,
    pub start_url: String,
}

impl SiteInfo {
    pub fn new(name: &str, country: &str, language: &str, start_url: &str) -> Self {
        Self {
            name: name.to_string(),
            country: country.to_string(),
            language: language.to_string(),
            start_url: start_url.to_string(),
        }
    }
}

/// One listing entry point: a volume, a category, a document type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub label: String,
    pub url: String,
    /// Fields shared by every document under this section.
    pub extra: ExtraFields,
}

impl Section {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
            extra: ExtraFields::default(),
        }
    }

    pub fn with_extra(mut self, extra: ExtraFields) -> Self {
        self.extra = extra;
        self
    }
}

/// A document link found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub url: String,
    /// Title when the listing shows one.
    pub title: Option<String>,
    /// Further file URLs the listing shows next to the entry.
    pub files: Vec<String>,
    pub extra: ExtraFields,
}

impl ListingEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            files: Vec::new(),
            extra: ExtraFields::default(),
        }
    }

    pub fn with_file(mut self, url: impl Into<String>) -> Self {
        self.files.push(url.into());
        self
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        if !title.trim().is_empty() {
            self.title = Some(title.trim().to_string());
        }
        self
    }

    pub fn with_extra(mut self, extra: ExtraFields) -> Self {
        self.extra = extra;
        self
    }
}

/// Files saved (and individual files that failed) for one entry.
#[derive(Debug, Default)]
pub struct Processed {
    pub title: String,
    pub saved: Vec<SaveOutcome>,
    pub failed: Vec<ScrapeError>,
}

impl Processed {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn push(&mut self, result: Result<SaveOutcome, ScrapeError>) {
        match result {
            Ok(outcome) => self.saved.push(outcome),
            Err(e) => self.failed.push(e),
        }
    }
}

/// A site crawled over plain HTTP: sections, paginated listings, documents.
#[async_trait]
pub trait ListingSite: Send + Sync {
    fn info(&self) -> SiteInfo;

    /// Listing entry points. A failure here means the start page is unreachable.
    async fn sections(&self, ctx: &RunContext) -> Result<Vec<Section>, ScrapeError>;

    fn pagination(&self, section: &Section) -> Pagination;

    /// Document entries on one listing page.
    fn entries(&self, page: &Markup, section: &Section) -> Result<Vec<ListingEntry>, ScrapeError>;

    /// Total page count, for listings that advertise one.
    fn page_count(&self, _page: &Markup) -> Option<u32> {
        None
    }

    /// Fetch and save one document (possibly several files).
    async fn process(&self, entry: &ListingEntry, ctx: &RunContext)
        -> Result<Processed, ScrapeError>;
}

/// A site that can only be navigated by clicking through a browser.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    fn info(&self) -> SiteInfo;

    /// Walk the site, saving documents through `ctx` and counting into
    /// `summary`. A returned error ends the run.
    async fn run(
        &self,
        session: &mut dyn BrowserSession,
        ctx: &RunContext,
        summary: &mut RunSummary,
    ) -> Result<(), ScrapeError>;
}
