//! India: India Code, Central Acts browsed by act number.
//!
//! The act-number index is itself paged by a "next" link and only lists
//! groups; every group page (widened to 100 rows) becomes a section whose
//! rows link to act pages, and an act page links its PDF under
//! `/bitstream/`.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{info, warn};
use url::Url;

use crate::error::ScrapeError;
use crate::models::DocumentFormat;
use crate::scrapers::markup::inline_text;
use crate::scrapers::{
    ListingEntry, ListingSite, Markup, Pagination, Processed, RunContext, Section, SiteInfo,
};
use crate::services::DocumentTarget;

const START_URL: &str = "https://www.indiacode.nic.in/handle/123456789/1362/browse?type=actno";
const NEXT_INDEX_PAGE: &str = "a.pull-right";

static ACT_GROUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/handle/123456789/1362/browse\?type=actno&order=ASC&rpp=20&value=[0-9]+").unwrap()
});
static ACT_PAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/handle/123456789/[0-9]+\?view_type=browse&sam_handle=123456789/1362").unwrap()
});
static ACT_PDF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/bitstream/123456789/[^/]+/[^/]+/.+\.pdf").unwrap());

pub struct India;

/// One page of the act-number index: group links and the next index page.
fn index_page(page: &Markup) -> (Vec<Section>, Option<String>) {
    let groups = page
        .links()
        .into_iter()
        .filter(|link| ACT_GROUP.is_match(&link.url))
        .map(|link| {
            let url = link.url.replace("rpp=20", "rpp=100");
            let label = Url::parse(&url)
                .ok()
                .and_then(|u| {
                    u.query_pairs()
                        .find(|(k, _)| k == "value")
                        .map(|(_, v)| format!("Act no. {v}"))
                })
                .unwrap_or_else(|| url.clone());
            Section::new(label, url)
        })
        .collect();
    let next = page
        .links_in(NEXT_INDEX_PAGE)
        .ok()
        .and_then(|links| links.into_iter().next())
        .map(|link| link.url);
    (groups, next)
}

#[async_trait]
impl ListingSite for India {
    fn info(&self) -> SiteInfo {
        SiteInfo::new("india", "India", "english", START_URL)
    }

    async fn sections(&self, ctx: &RunContext) -> Result<Vec<Section>, ScrapeError> {
        let mut sections = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(START_URL.to_string());

        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) {
                break;
            }
            let html = match ctx.client().get_text(&url).await {
                Ok(html) => html,
                Err(e) if sections.is_empty() => return Err(e),
                Err(e) => {
                    warn!("india: act index page {} unavailable: {}", url, e);
                    break;
                }
            };
            let (groups, following) = index_page(&Markup::parse(&html, &url));
            sections.extend(groups);
            if !ctx.test_run() {
                next = following;
            }
        }
        info!("india: {} act groups indexed", sections.len());
        Ok(sections)
    }

    fn pagination(&self, _section: &Section) -> Pagination {
        Pagination::Single
    }

    fn entries(&self, page: &Markup, _section: &Section) -> Result<Vec<ListingEntry>, ScrapeError> {
        let mut seen = HashSet::new();
        Ok(page
            .links()
            .into_iter()
            .filter(|link| ACT_PAGE.is_match(&link.url))
            .filter(|link| seen.insert(link.url.clone()))
            .map(|link| ListingEntry::new(link.url).titled(link.text))
            .collect())
    }

    async fn process(
        &self,
        entry: &ListingEntry,
        ctx: &RunContext,
    ) -> Result<Processed, ScrapeError> {
        let html = ctx.client().get_text(&entry.url).await?;
        let (title, pdf) = {
            let page = Markup::parse(&html, &entry.url);
            let title = inline_text(page.require("p#short_title", "act short title")?);
            let pdf = page
                .select("a[href]")?
                .into_iter()
                .filter_map(|a| a.value().attr("href"))
                .find(|href| ACT_PDF.is_match(href))
                .and_then(|href| page.resolve(href))
                .ok_or_else(|| ScrapeError::markup(&entry.url, "act PDF link"))?;
            (title, pdf)
        };

        let info = self.info();
        let target = DocumentTarget::new(&title, &pdf, &info.language, &info.country)
            .format(DocumentFormat::Pdf);
        let mut processed = Processed::new(&title);
        processed.push(ctx.downloader().save_remote(&target, &pdf).await);
        Ok(processed)
    }
}
