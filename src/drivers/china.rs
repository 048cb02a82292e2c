//! China: State Council law and regulation index (gov.cn `/flfg/`).
//!
//! Law pages either link one or more PDFs (the file URL sits in the anchor's
//! `title` attribute) or carry the text in `<p>` elements.

use async_trait::async_trait;

use crate::error::ScrapeError;
use crate::models::DocumentFormat;
use crate::scrapers::markup::inline_text;
use crate::scrapers::{
    ListingEntry, ListingSite, Markup, Pagination, Processed, RunContext, Section, SiteInfo,
};
use crate::services::DocumentTarget;
use crate::storage::FileStem;

const START_URL: &str = "http://www.gov.cn/flfg/index.htm";

pub struct China;

/// A PDF attachment on a law page.
struct Attachment {
    url: String,
    label: String,
}

#[async_trait]
impl ListingSite for China {
    fn info(&self) -> SiteInfo {
        SiteInfo::new("china", "China", "chinese", START_URL)
    }

    async fn sections(&self, _ctx: &RunContext) -> Result<Vec<Section>, ScrapeError> {
        Ok(vec![Section::new("flfg", START_URL)])
    }

    fn pagination(&self, _section: &Section) -> Pagination {
        Pagination::Single
    }

    fn entries(&self, page: &Markup, _section: &Section) -> Result<Vec<ListingEntry>, ScrapeError> {
        Ok(page
            .links()
            .into_iter()
            .filter(|link| link.url.contains("/flfg/") && link.url != START_URL)
            .filter(|link| !link.text.is_empty())
            .map(|link| ListingEntry::new(link.url).titled(link.text))
            .collect())
    }

    async fn process(
        &self,
        entry: &ListingEntry,
        ctx: &RunContext,
    ) -> Result<Processed, ScrapeError> {
        let title = entry
            .title
            .clone()
            .ok_or_else(|| ScrapeError::markup(&entry.url, "law title"))?;
        let html = ctx.client().get_text(&entry.url).await?;
        let (attachments, text) = {
            let page = Markup::parse(&html, &entry.url);
            let attachments: Vec<Attachment> = page
                .select("a[href*=pdf]")?
                .into_iter()
                .filter_map(|a| {
                    let source = a.value().attr("title").or(a.value().attr("href"))?;
                    Some(Attachment {
                        url: page.resolve(source)?,
                        label: inline_text(a),
                    })
                })
                .collect();
            (attachments, page.paragraph_text())
        };

        let info = self.info();
        let mut processed = Processed::new(&title);
        if attachments.is_empty() {
            let target = DocumentTarget::new(&title, &entry.url, &info.language, &info.country);
            processed.push(ctx.downloader().save_text(&target, &text).await);
            return Ok(processed);
        }

        let several = attachments.len() > 1;
        for (i, attachment) in attachments.iter().enumerate() {
            let mut stem = FileStem::new(&title);
            if several {
                stem = stem
                    .with_excerpt(&attachment.label)
                    .with_suffix(format!("__{i}"));
            }
            let target = DocumentTarget::new(&title, &attachment.url, &info.language, &info.country)
                .format(DocumentFormat::Pdf)
                .stem(stem);
            processed.push(ctx.downloader().save_remote(&target, &attachment.url).await);
        }
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::testing::{context, TestRoot};
    use crate::ledger::Ledger;
    use crate::scrapers::crawl;
    use crate::scrapers::http_client::fake::StaticTransport;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_text_and_multiple_pdfs() {
        let root = TestRoot::new();
        let decree = "http://www.gov.cn/flfg/2020-01/01/content_1.htm";
        let code = "http://www.gov.cn/flfg/2020-01/02/content_2.htm";
        let transport = Arc::new(
            StaticTransport::new()
                .page(
                    START_URL,
                    &format!(
                        r#"<a href="{decree}">国务院令</a><a href="{code}">民法典</a><a href="/other/x.htm">x</a>"#
                    ),
                )
                .page(decree, "<p>第一条</p><p>第二条</p>")
                .page(
                    code,
                    r#"<a href="x.pdf" title="http://www.gov.cn/files/a.pdf">上</a>
                       <a href="y.pdf" title="http://www.gov.cn/files/b.pdf">下</a>"#,
                )
                .file("http://www.gov.cn/files/a.pdf", b"%PDF-1.4 a", "application/pdf")
                .file("http://www.gov.cn/files/b.pdf", b"%PDF-1.4 b", "application/pdf"),
        );
        let ctx = context(&root, transport);

        let summary = crawl(&China, &ctx).await.unwrap();
        assert_eq!(summary.downloaded, 3);

        let loaded = Ledger::load(&ctx.settings().metadata_path).await.unwrap();
        assert!(loaded.iter().any(|r| r.title == "国务院令"));
        let text_path = loaded
            .iter()
            .find(|r| r.title == "国务院令")
            .map(|r| r.download_path.clone())
            .unwrap();
        assert_eq!(std::fs::read_to_string(text_path).unwrap(), "第一条\n第二条");
        let raw = std::fs::read_to_string(&ctx.settings().metadata_path).unwrap();
        assert!(raw.contains("国务院令"));
    }
}
