//! Albania: EURALIUS library of Albanian legislation (English translations).

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::error::ScrapeError;
use crate::models::DocumentFormat;
use crate::scrapers::markup::inline_text;
use crate::scrapers::{
    ListingEntry, ListingSite, Markup, Pagination, Processed, RunContext, Section, SiteInfo,
};
use crate::services::DocumentTarget;

const START_URL: &str =
    "https://euralius.eu/index.php/en/library/albanian-legislation/category/360-laws";

static LAW_PAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/index\.php/en/library/albanian-legislation/category/[0-9a-zA-Z-]+").unwrap()
});

pub struct Albania;

#[async_trait]
impl ListingSite for Albania {
    fn info(&self) -> SiteInfo {
        SiteInfo::new("albania", "Albania", "english", START_URL)
    }

    async fn sections(&self, _ctx: &RunContext) -> Result<Vec<Section>, ScrapeError> {
        Ok(vec![Section::new("laws", START_URL)])
    }

    fn pagination(&self, _section: &Section) -> Pagination {
        Pagination::Single
    }

    fn entries(&self, page: &Markup, _section: &Section) -> Result<Vec<ListingEntry>, ScrapeError> {
        Ok(page
            .links()
            .into_iter()
            .filter(|link| LAW_PAGE.is_match(&link.url) && link.url != START_URL)
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
            let anchor = page
                .elements("a", Some(("title", "Download")))?
                .into_iter()
                .find(|a| a.value().attr("href").is_some())
                .ok_or_else(|| ScrapeError::markup(&entry.url, "Download link"))?;
            let pdf = page
                .link(anchor)
                .ok_or_else(|| ScrapeError::markup(&entry.url, "Download link href"))?;
            (inline_text(anchor), pdf.url)
        };

        let title = if title.is_empty() {
            entry.title.clone().ok_or_else(|| ScrapeError::markup(&entry.url, "title"))?
        } else {
            title
        };
        let info = self.info();
        let target = DocumentTarget::new(&title, &pdf, &info.language, &info.country)
            .format(DocumentFormat::Pdf);
        let mut processed = Processed::new(&title);
        processed.push(ctx.downloader().save_remote(&target, &pdf).await);
        Ok(processed)
    }
}
