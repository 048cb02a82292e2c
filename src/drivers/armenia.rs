//! Armenia: National Assembly legislation database, English edition.
//!
//! Each law page offers an English PDF under `/law_docs/`; when it does not,
//! the page text itself is saved.

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

const START_URL: &str = "http://www.parliament.am/legislation.php?sel=alpha&lang=eng";

static LAW_PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/legislation\.php\?sel=show&ID=[0-9]+&lang=eng").unwrap());
static ENGLISH_PDF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/law_docs/[0-9a-zA-Z]+eng\.pdf").unwrap());

pub struct Armenia;

enum Content {
    Pdf(String),
    Text(String),
}

#[async_trait]
impl ListingSite for Armenia {
    fn info(&self) -> SiteInfo {
        SiteInfo::new("armenia", "Armenia", "english", START_URL)
    }

    async fn sections(&self, _ctx: &RunContext) -> Result<Vec<Section>, ScrapeError> {
        Ok(vec![Section::new("alphabetical", START_URL)])
    }

    fn pagination(&self, _section: &Section) -> Pagination {
        Pagination::Single
    }

    fn entries(&self, page: &Markup, _section: &Section) -> Result<Vec<ListingEntry>, ScrapeError> {
        let mut seen = std::collections::HashSet::new();
        Ok(page
            .links()
            .into_iter()
            .filter(|link| LAW_PAGE.is_match(&link.url) && seen.insert(link.url.clone()))
            .map(|link| ListingEntry::new(link.url).titled(link.text))
            .collect())
    }

    async fn process(
        &self,
        entry: &ListingEntry,
        ctx: &RunContext,
    ) -> Result<Processed, ScrapeError> {
        let html = ctx.client().get_text(&entry.url).await?;
        let (title, content) = {
            let page = Markup::parse(&html, &entry.url);
            let title = inline_text(page.require("h3", "law title")?);
            let pdf = page
                .links()
                .into_iter()
                .find(|link| ENGLISH_PDF.is_match(&link.url));
            let content = match pdf {
                Some(link) => Content::Pdf(link.url),
                None => Content::Text(page.text()),
            };
            (title, content)
        };

        let info = self.info();
        let mut processed = Processed::new(&title);
        let result = match content {
            Content::Pdf(url) => {
                let target = DocumentTarget::new(&title, &url, &info.language, &info.country)
                    .format(DocumentFormat::Pdf);
                ctx.downloader().save_remote(&target, &url).await
            }
            Content::Text(text) => {
                let target = DocumentTarget::new(&title, &entry.url, &info.language, &info.country);
                ctx.downloader().save_text(&target, &text).await
            }
        };
        processed.push(result);
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::testing::{context, TestRoot};
    use crate::models::DocumentFormat;
    use crate::scrapers::crawl;
    use crate::scrapers::http_client::fake::StaticTransport;
    use std::sync::Arc;

    const LAW_1: &str = "http://www.parliament.am/legislation.php?sel=show&ID=1349&lang=eng";
    const LAW_2: &str = "http://www.parliament.am/legislation.php?sel=show&ID=1350&lang=eng";

    fn listing() -> String {
        format!(
            r#"<a href="{LAW_1}">Law on Courts</a><a href="{LAW_2}">Civil Code</a>
               <a href="/legislation.php?sel=alpha&lang=arm">Armenian</a>"#
        )
    }

    #[tokio::test]
    async fn test_pdf_preferred_then_text_fallback() {
        let root = TestRoot::new();
        let transport = Arc::new(
            StaticTransport::new()
                .page(START_URL, &listing())
                .page(
                    LAW_1,
                    r#"<h3>Law on Courts</h3><a href="/law_docs/110999courtseng.pdf">PDF</a>"#,
                )
                .file(
                    "http://www.parliament.am/law_docs/110999courtseng.pdf",
                    b"%PDF-1.4",
                    "application/pdf",
                )
                .page(LAW_2, "<h3>Civil Code</h3><p>Article 1. Scope</p>"),
        );
        let ctx = context(&root, transport);

        let summary = crawl(&Armenia, &ctx).await.unwrap();
        assert_eq!(summary.downloaded, 2);
        let formats: Vec<_> = ctx
            .ledger()
            .records()
            .iter()
            .map(|r| DocumentFormat::from_url(&r.download_path.to_string_lossy()))
            .collect();
        assert!(formats.contains(&Some(DocumentFormat::Pdf)));
        assert!(formats.contains(&Some(DocumentFormat::Txt)));
    }

    #[tokio::test]
    async fn test_missing_title_skips_document_and_continues() {
        let root = TestRoot::new();
        let transport = Arc::new(
            StaticTransport::new()
                .page(START_URL, &listing())
                .page(LAW_1, "<p>no heading</p>")
                .page(LAW_2, "<h3>Civil Code</h3><p>Article 1</p>"),
        );
        let ctx = context(&root, transport);

        let summary = crawl(&Armenia, &ctx).await.unwrap();
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].kind, "markup_not_found");
        assert_eq!(summary.skipped[0].url, LAW_1);
        assert_eq!(ctx.ledger().len(), 1);
    }
}
