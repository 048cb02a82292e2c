//! Bangladesh: Laws of Bangladesh, organized in volumes.
//!
//! Acts are saved by rendering their print view to PDF.

use async_trait::async_trait;
use url::Url;

use crate::error::ScrapeError;
use crate::scrapers::markup::inline_text;
use crate::scrapers::{
    ListingEntry, ListingSite, Markup, Pagination, Processed, RunContext, Section, SiteInfo,
};
use crate::services::DocumentTarget;

const START_URL: &str = "http://bdlaws.minlaw.gov.bd/laws-of-bangladesh.html";

pub struct Bangladesh;

/// Print view of an act: `/act-123.html` becomes `/act-print-123.html`.
pub fn print_url(act_url: &str) -> String {
    match Url::parse(act_url) {
        Ok(mut url) => {
            let path = url.path().replace("act", "act-print");
            url.set_path(&path);
            url.to_string()
        }
        Err(_) => act_url.replace("act", "act-print"),
    }
}

#[async_trait]
impl ListingSite for Bangladesh {
    fn info(&self) -> SiteInfo {
        SiteInfo::new("bangladesh", "Bangladesh", "bangla", START_URL)
    }

    async fn sections(&self, ctx: &RunContext) -> Result<Vec<Section>, ScrapeError> {
        let html = ctx.client().get_text(START_URL).await?;
        let page = Markup::parse(&html, START_URL);
        let volumes: Vec<Section> = page
            .links_in("li.volume a")?
            .into_iter()
            .map(|link| Section::new(link.text, link.url))
            .collect();
        if volumes.is_empty() {
            return Err(ScrapeError::markup(START_URL, "volume list (li.volume)"));
        }
        Ok(volumes)
    }

    fn pagination(&self, _section: &Section) -> Pagination {
        Pagination::Single
    }

    fn entries(&self, page: &Markup, _section: &Section) -> Result<Vec<ListingEntry>, ScrapeError> {
        let bodies = page.select("tbody")?;
        let [body] = bodies.as_slice() else {
            return Err(ScrapeError::markup(
                page.url(),
                format!("exactly one act table, found {}", bodies.len()),
            ));
        };
        let mut entries = Vec::new();
        for row in page.select_in(*body, "tr")? {
            let cells = page.select_in(row, "td")?;
            let Some(anchor) = cells
                .get(1)
                .and_then(|cell| page.select_in(*cell, "a").ok())
                .and_then(|anchors| anchors.into_iter().next())
            else {
                continue;
            };
            if let Some(link) = page.link(anchor) {
                entries.push(ListingEntry::new(link.url).titled(inline_text(anchor)));
            }
        }
        Ok(entries)
    }

    async fn process(
        &self,
        entry: &ListingEntry,
        ctx: &RunContext,
    ) -> Result<Processed, ScrapeError> {
        let title = entry
            .title
            .clone()
            .ok_or_else(|| ScrapeError::markup(&entry.url, "act name"))?;
        let print = print_url(&entry.url);
        let info = self.info();
        let target = DocumentTarget::new(&title, &print, &info.language, &info.country);

        let mut processed = Processed::new(&title);
        processed.push(ctx.downloader().save_rendered(&target, &print).await);
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::testing::{context_with_renderer, TestRoot};
    use crate::scrapers::crawl;
    use crate::scrapers::http_client::fake::StaticTransport;
    use std::sync::Arc;

    const VOLUME: &str = "http://bdlaws.minlaw.gov.bd/volume-1.html";

    fn volume_page() -> &'static str {
        r#"<table><tbody>
             <tr><td>1</td><td><a href="/act-5.html">The Bengal Districts Act, 1836</a></td></tr>
             <tr><td>2</td><td><a href="/act-7.html">The Indian Limitation Act</a></td></tr>
           </tbody></table>"#
    }

    #[test]
    fn test_print_url() {
        assert_eq!(
            print_url("http://bdlaws.minlaw.gov.bd/act-5.html"),
            "http://bdlaws.minlaw.gov.bd/act-print-5.html"
        );
    }

    #[test]
    fn test_entries_need_exactly_one_table() {
        let section = Section::new("Volume 1", VOLUME);
        let page = Markup::parse(volume_page(), VOLUME);
        let entries = Bangladesh.entries(&page, &section).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title.as_deref(), Some("The Bengal Districts Act, 1836"));

        let two = Markup::parse(
            "<table><tbody></tbody></table><table><tbody></tbody></table>",
            VOLUME,
        );
        assert!(Bangladesh.entries(&two, &section).is_err());
    }

    #[tokio::test]
    async fn test_volumes_rendered_in_test_run() {
        let root = TestRoot::new();
        let transport = Arc::new(
            StaticTransport::new()
                .page(
                    START_URL,
                    r#"<ul><li class="volume"><a href="/volume-1.html">Volume 1</a></li>
                           <li class="volume"><a href="/volume-2.html">Volume 2</a></li></ul>"#,
                )
                .page(VOLUME, volume_page()),
        );
        let ctx = context_with_renderer(&root, transport.clone(), true);

        let summary = crawl(&Bangladesh, &ctx).await.unwrap();
        assert_eq!(summary.downloaded, 1);
        let record = &ctx.ledger().records()[0];
        assert_eq!(record.source_link, "http://bdlaws.minlaw.gov.bd/act-print-5.html");
        assert_eq!(record.language, "bangla");
        assert_eq!(transport.count("http://bdlaws.minlaw.gov.bd/volume-2.html"), 0);
    }

    #[tokio::test]
    async fn test_missing_volume_list_is_unreachable_start() {
        let root = TestRoot::new();
        let transport = Arc::new(StaticTransport::new().page(START_URL, "<p>maintenance</p>"));
        let ctx = context_with_renderer(&root, transport, false);
        let err = crawl(&Bangladesh, &ctx).await.unwrap_err();
        assert!(!err.is_recoverable());
    }
}
