//! Kosovo: Official Gazette, laws in force (gzk.rks-gov.net).
//!
//! The list is an ASP.NET grid paged by a "Next" link button, so it is
//! walked in a browser. Each act page is switched to English before the
//! main act is opened and its text read; abolished acts are passed over.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::ScrapeError;
use crate::scrapers::browser::{find_by_text, find_required};
use crate::scrapers::markup::plain_text;
use crate::scrapers::{
    BrowserDriver, BrowserSession, Markup, Processed, RunContext, RunEvent, RunSummary, SiteInfo,
};
use crate::services::DocumentTarget;

const START_URL: &str = "https://gzk.rks-gov.net/LawInForceList.aspx";
const MAIN_ACT: &str = "a[href*=ActDocumentDetail]";
const ABOLISHED: &str = "#MainContent_lblAct_Ne_Fuqi_Txt";
const DOCUMENT: &str = "#MainContent_txtDocument";

pub struct Kosovo;

impl Kosovo {
    /// Collect act links from every page of the list.
    async fn collect_links(
        &self,
        session: &mut dyn BrowserSession,
        ctx: &RunContext,
        summary: &mut RunSummary,
    ) -> Result<Vec<String>, ScrapeError> {
        let mut seen = HashSet::new();
        let mut links = Vec::new();
        loop {
            let anchors = session.find_elements("a").await?;
            summary.pages_visited += 1;

            let before = links.len();
            for href in anchors.iter().filter_map(|a| a.attr("href")) {
                if href.contains("https") && seen.insert(href.to_string()) {
                    links.push(href.to_string());
                }
            }
            let url = session.current_url().await?;
            ctx.emit(RunEvent::PageVisited {
                url,
                entries: links.len() - before,
            })
            .await;

            if ctx.test_run() {
                break;
            }
            let next = anchors.iter().find(|a| {
                a.has_class("Linkbutton") && a.attr("id").is_some_and(|id| id.contains("Next"))
            });
            match next {
                Some(next) if links.len() > before => session.click(next).await?,
                Some(_) => {
                    debug!("Next page repeated the previous one; list ended");
                    break;
                }
                None => break,
            }
        }
        Ok(links)
    }

    /// Save one act's English text; `None` when the act is abolished.
    async fn act(
        &self,
        session: &mut dyn BrowserSession,
        ctx: &RunContext,
        link: &str,
    ) -> Result<Option<Processed>, ScrapeError> {
        session.navigate(link).await?;
        let english = find_by_text(session, "a", "English").await?;
        session.click(&english).await?;

        let main = find_required(session, MAIN_ACT).await?.remove(0);
        let title = main.text.trim().to_string();
        let abolished = session.find_elements(ABOLISHED).await?;
        if abolished.iter().any(|el| el.text.contains("ABOLISHED")) {
            info!("Skipping abolished act: {}", title);
            return Ok(None);
        }

        session.click(&main).await?;
        find_required(session, DOCUMENT).await?;
        let html = session.page_source().await?;
        let url = session.current_url().await?;
        let text = {
            let page = Markup::parse(&html, &url);
            plain_text(page.require(DOCUMENT, "act text")?)
        };

        let info = self.info();
        let target = DocumentTarget::new(&title, link, &info.language, &info.country);
        let mut processed = Processed::new(&title);
        processed.push(ctx.downloader().save_text(&target, &text).await);
        Ok(Some(processed))
    }
}

#[async_trait]
impl BrowserDriver for Kosovo {
    fn info(&self) -> SiteInfo {
        SiteInfo::new("kosovo", "Kosovo", "english", START_URL)
    }

    async fn run(
        &self,
        session: &mut dyn BrowserSession,
        ctx: &RunContext,
        summary: &mut RunSummary,
    ) -> Result<(), ScrapeError> {
        session
            .navigate(START_URL)
            .await
            .map_err(|e| ScrapeError::start_unreachable(START_URL, e.into()))?;

        let mut links = self.collect_links(session, ctx, summary).await?;
        info!("kosovo: {} acts listed", links.len());
        if ctx.test_run() {
            links.truncate(1);
        }
        summary.discovered += links.len();

        for link in &links {
            match self.act(session, ctx, link).await {
                Ok(Some(processed)) => summary.absorb(ctx, link, processed).await,
                Ok(None) => {}
                Err(e) => summary.skip(ctx, link, None, &e).await,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::testing::{context, TestRoot};
    use crate::scrapers::drive;
    use crate::scrapers::http_client::fake::StaticTransport;
    use crate::scrapers::ReplaySession;
    use std::sync::Arc;

    const ACT_1: &str = "https://gzk.rks-gov.net/ActDetail.aspx?ActID=1";
    const ACT_2: &str = "https://gzk.rks-gov.net/ActDetail.aspx?ActID=2";

    fn act_pages(session: &mut ReplaySession, id: u32, title: &str, status: &str) {
        session.add_page(
            &format!("https://gzk.rks-gov.net/ActDetail.aspx?ActID={id}"),
            &format!(r#"<ul><li><a href="?ActID={id}">Shqip</a></li><li><a href="/ActDetail.aspx?ActID={id}&lang=en">English</a></li></ul>"#),
        );
        session.add_page(
            &format!("https://gzk.rks-gov.net/ActDetail.aspx?ActID={id}&lang=en"),
            &format!(
                r#"<div><a href="/ActDocumentDetail.aspx?ActID={id}">{title}</a></div>
                   <span id="MainContent_lblAct_Ne_Fuqi_Txt">{status}</span>"#
            ),
        );
        session.add_page(
            &format!("https://gzk.rks-gov.net/ActDocumentDetail.aspx?ActID={id}"),
            &format!(r#"<textarea id="MainContent_txtDocument">{title}
Article 1</textarea>"#),
        );
    }

    fn site() -> ReplaySession {
        let mut session = ReplaySession::new();
        session.add_page(
            START_URL,
            &format!(
                r#"<a href="{ACT_1}">Law 1</a>
                   <a class="Linkbutton" id="MainContent_btnNext" href="/LawInForceList.aspx?page=2">Next</a>"#
            ),
        );
        session.add_page(
            "https://gzk.rks-gov.net/LawInForceList.aspx?page=2",
            &format!(
                r#"<a href="{ACT_2}">Law 2</a>
                   <a class="Linkbutton" id="MainContent_btnNext" href="/LawInForceList.aspx?page=2">Next</a>"#
            ),
        );
        act_pages(&mut session, 1, "LAW NO. 08/L-001 ON COURTS", "IN FORCE");
        act_pages(&mut session, 2, "LAW NO. 02/L-002 ON ROADS", "ABOLISHED");
        session
    }

    #[tokio::test]
    async fn test_pages_until_next_repeats_and_skips_abolished() {
        let root = TestRoot::new();
        let ctx = context(&root, Arc::new(StaticTransport::new()));
        let mut session = site();

        let summary = drive(&Kosovo, &mut session, &ctx).await.unwrap();
        assert_eq!(summary.pages_visited, 3);
        assert_eq!(summary.discovered, 2);
        assert_eq!(summary.downloaded, 1);
        assert!(summary.skipped.is_empty());

        let records = ctx.ledger().records();
        assert_eq!(records[0].title, "LAW NO. 08/L-001 ON COURTS");
        assert_eq!(records[0].source_link, ACT_1);
        let text = std::fs::read_to_string(&records[0].download_path).unwrap();
        assert!(text.contains("Article 1"));
    }

    #[tokio::test]
    async fn test_missing_document_skips_act() {
        let root = TestRoot::new();
        let ctx = context(&root, Arc::new(StaticTransport::new()));
        let mut session = site();
        session.add_page(
            "https://gzk.rks-gov.net/ActDocumentDetail.aspx?ActID=1",
            "<p>Document unavailable</p>",
        );

        let summary = drive(&Kosovo, &mut session, &ctx).await.unwrap();
        assert_eq!(summary.downloaded, 0);
        assert_eq!(summary.skipped[0].kind, "automation_element_not_found");
        assert!(summary.aborted.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_list() {
        let root = TestRoot::new();
        let ctx = context(&root, Arc::new(StaticTransport::new()));
        let err = drive(&Kosovo, &mut ReplaySession::new(), &ctx)
            .await
            .unwrap_err();
        assert!(!err.is_recoverable());
        assert!(!root.path().join("metadata.json").exists());
    }
}
