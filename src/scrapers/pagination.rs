//! Listing pagination with explicit stop conditions.
//!
//! A [`PageCursor`] walks one listing section. After each page the caller
//! reports what it saw as a [`PageObservation`] and [`PageCursor::advance`]
//! decides, without any I/O, whether there is a next page and where it is.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::markup::{inline_text, Markup};

/// Placeholder substituted with the page number in [`Pagination::PageParam`]
/// section URLs that carry the page in their path.
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// How a listing continues past its first page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Pagination {
    /// One page, no continuation.
    #[default]
    Single,
    /// Follow the first link matching `selector`; stop when it is absent or
    /// points at an already visited page.
    NextLink { selector: String },
    /// Count pages through a query parameter (or a `{page}` placeholder in
    /// the section URL); stop on an empty page or past `last`.
    PageParam {
        param: String,
        #[serde(default = "default_first_page")]
        first: u32,
        #[serde(default)]
        last: Option<u32>,
    },
    /// Read a cursor value (e.g. a publication date) from every page and
    /// follow `next`; stop once the cursor repeats.
    RepeatedCursor { cursor: String, next: String },
}

fn default_first_page() -> u32 {
    1
}

impl Pagination {
    pub fn page_param(param: &str) -> Self {
        Self::PageParam {
            param: param.to_string(),
            first: 1,
            last: None,
        }
    }

    /// URL of the first page for a section.
    pub fn first_url(&self, section_url: &str) -> String {
        match self {
            Self::PageParam { param, first, .. } => page_url(section_url, param, *first),
            _ => section_url.to_string(),
        }
    }

    /// Collect what this strategy needs from a listing page.
    pub fn observe(&self, page: &Markup, entries: usize) -> PageObservation {
        let mut observed = PageObservation::new(entries);
        match self {
            Self::Single | Self::PageParam { .. } => {}
            Self::NextLink { selector } => {
                observed.next_link = first_link(page, selector);
            }
            Self::RepeatedCursor { cursor, next } => {
                observed.cursor = page.first(cursor).ok().flatten().map(|el| {
                    el.value()
                        .attr("value")
                        .map(|v| v.trim().to_string())
                        .unwrap_or_else(|| inline_text(el))
                });
                observed.next_link = first_link(page, next);
            }
        }
        observed
    }
}

fn first_link(page: &Markup, selector: &str) -> Option<String> {
    page.links_in(selector)
        .ok()
        .and_then(|links| links.into_iter().next())
        .map(|link| link.url)
}

/// Build the URL of page `n` of a section.
pub fn page_url(section_url: &str, param: &str, n: u32) -> String {
    if section_url.contains(PAGE_PLACEHOLDER) {
        return section_url.replace(PAGE_PLACEHOLDER, &n.to_string());
    }
    match Url::parse(section_url) {
        Ok(mut url) => {
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(k, _)| k != param)
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            url.query_pairs_mut()
                .clear()
                .extend_pairs(kept)
                .append_pair(param, &n.to_string());
            url.to_string()
        }
        Err(_) => {
            let sep = if section_url.contains('?') { '&' } else { '?' };
            format!("{section_url}{sep}{param}={n}")
        }
    }
}

/// What a listing page showed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageObservation {
    /// Document entries found on the page.
    pub entries: usize,
    pub next_link: Option<String>,
    pub cursor: Option<String>,
    /// Total page count when the page advertises one.
    pub page_count: Option<u32>,
}

impl PageObservation {
    pub fn new(entries: usize) -> Self {
        Self {
            entries,
            ..Default::default()
        }
    }

    pub fn with_next(mut self, next: Option<String>) -> Self {
        self.next_link = next;
        self
    }

    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn with_page_count(mut self, count: Option<u32>) -> Self {
        self.page_count = count;
        self
    }
}

/// Why a listing section ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    SinglePage,
    NoEntries,
    NoNextLink,
    RepeatedUrl,
    PastLastPage,
    RepeatedCursor,
}

/// Position within one listing section.
#[derive(Debug, Clone)]
pub struct PageCursor {
    pagination: Pagination,
    section_url: String,
    current: String,
    page: u32,
    last: Option<u32>,
    visited: HashSet<String>,
    last_cursor: Option<String>,
    stopped: Option<StopReason>,
}

impl PageCursor {
    pub fn new(pagination: Pagination, section_url: &str) -> Self {
        let current = pagination.first_url(section_url);
        let (page, last) = match &pagination {
            Pagination::PageParam { first, last, .. } => (*first, *last),
            _ => (1, None),
        };
        Self {
            visited: HashSet::from([current.clone()]),
            pagination,
            section_url: section_url.to_string(),
            current,
            page,
            last,
            last_cursor: None,
            stopped: None,
        }
    }

    /// URL of the page being processed.
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Page number, counted from the pagination's first page.
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stopped
    }

    /// Decide the next page from what the current page showed.
    ///
    /// Returns `None` once the section is exhausted; every later call also
    /// returns `None`. For [`Pagination::RepeatedCursor`] without a next
    /// link the current URL is returned, for callers that move on by
    /// clicking rather than by loading a URL.
    pub fn advance(&mut self, observed: &PageObservation) -> Option<String> {
        if self.stopped.is_some() {
            return None;
        }
        let next = self.next(observed);
        match next {
            Ok(url) => {
                self.visited.insert(url.clone());
                self.current = url.clone();
                Some(url)
            }
            Err(reason) => {
                debug!("Listing {} ended: {:?}", self.section_url, reason);
                self.stopped = Some(reason);
                None
            }
        }
    }

    fn next(&mut self, observed: &PageObservation) -> Result<String, StopReason> {
        // a dated summary may list nothing and still point further back
        let cursor_paged = matches!(self.pagination, Pagination::RepeatedCursor { .. });
        if observed.entries == 0 && !cursor_paged {
            return Err(StopReason::NoEntries);
        }
        match &self.pagination {
            Pagination::Single => Err(StopReason::SinglePage),
            Pagination::NextLink { .. } => {
                let next = observed.next_link.clone().ok_or(StopReason::NoNextLink)?;
                if self.visited.contains(&next) {
                    return Err(StopReason::RepeatedUrl);
                }
                Ok(next)
            }
            Pagination::PageParam { param, .. } => {
                if self.last.is_none() {
                    self.last = observed.page_count;
                }
                let next_page = self.page + 1;
                if self.last.is_some_and(|last| next_page > last) {
                    return Err(StopReason::PastLastPage);
                }
                self.page = next_page;
                Ok(page_url(&self.section_url, param, next_page))
            }
            Pagination::RepeatedCursor { .. } => {
                let cursor = observed.cursor.clone();
                if cursor.is_none() || cursor == self.last_cursor {
                    return Err(StopReason::RepeatedCursor);
                }
                self.last_cursor = cursor;
                self.page += 1;
                Ok(observed
                    .next_link
                    .clone()
                    .unwrap_or_else(|| self.current.clone()))
            }
        }
    }
}
