//! The crawl engine shared by every driver.
//!
//! A listing run moves through Start, CollectListing, FetchAndSave and
//! Finalize: sections are walked page by page, every page's entries are
//! processed (concurrently up to `workers`), and [`PageCursor::advance`]
//! alone decides whether another page is fetched. The ledger is written
//! once at the end and optionally after every section.

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::browser::BrowserSession;
use super::context::{RunContext, RunEvent, RunSummary};
use super::markup::Markup;
use super::pagination::PageCursor;
use super::site::{BrowserDriver, ListingEntry, ListingSite};
use crate::error::ScrapeError;

/// Crawl a listing site to completion.
///
/// Only an unreachable start (sections or the first listing page) is an
/// error; everything else is collected into the summary.
pub async fn crawl(site: &dyn ListingSite, ctx: &RunContext) -> Result<RunSummary, ScrapeError> {
    let info = site.info();
    let mut summary = RunSummary::new(&info.name);

    let mut sections = site
        .sections(ctx)
        .await
        .map_err(|e| ScrapeError::start_unreachable(&info.start_url, e))?;
    if ctx.test_run() {
        sections.truncate(1);
    }
    info!("{}: {} listing sections", info.name, sections.len());

    for (index, section) in sections.iter().enumerate() {
        ctx.emit(RunEvent::SectionStarted {
            label: section.label.clone(),
        })
        .await;

        let pagination = site.pagination(section);
        let mut cursor = PageCursor::new(pagination.clone(), &section.url);
        let mut url = cursor.current().to_string();

        loop {
            let html = match ctx.client().get_text(&url).await {
                Ok(html) => html,
                Err(e) if index == 0 && summary.pages_visited == 0 => {
                    return Err(ScrapeError::start_unreachable(&url, e));
                }
                Err(e) => {
                    summary.skip(ctx, &url, Some(section.label.as_str()), &e).await;
                    break;
                }
            };
            summary.pages_visited += 1;

            let (listed, observed) = {
                let page = Markup::parse(&html, &url);
                let listed = site.entries(&page, section);
                let count = listed.as_ref().map(Vec::len).unwrap_or(0);
                let observed = pagination
                    .observe(&page, count)
                    .with_page_count(site.page_count(&page));
                (listed, observed)
            };

            let mut entries = match listed {
                Ok(entries) => entries,
                Err(e) => {
                    summary.skip(ctx, &url, Some(section.label.as_str()), &e).await;
                    Vec::new()
                }
            };
            debug!("{} entries on {}", entries.len(), url);
            ctx.emit(RunEvent::PageVisited {
                url: url.clone(),
                entries: entries.len(),
            })
            .await;

            if ctx.test_run() {
                entries.truncate(1);
            }
            for entry in &mut entries {
                entry.extra = std::mem::take(&mut entry.extra).merge(&section.extra);
            }
            summary.discovered += entries.len();
            process_entries(site, ctx, entries, &mut summary).await;

            if ctx.test_run() {
                break;
            }
            match cursor.advance(&observed) {
                Some(next) => url = next,
                None => break,
            }
        }

        ctx.checkpoint().await;
    }

    ctx.finalize().await?;
    Ok(summary)
}

async fn process_entries(
    site: &dyn ListingSite,
    ctx: &RunContext,
    entries: Vec<ListingEntry>,
    summary: &mut RunSummary,
) {
    let workers = ctx.settings().workers.max(1);
    let mut results = stream::iter(entries)
        .map(|entry| async move {
            let result = site.process(&entry, ctx).await;
            (entry, result)
        })
        .buffer_unordered(workers);

    while let Some((entry, result)) = results.next().await {
        match result {
            Ok(processed) => summary.absorb(ctx, &entry.url, processed).await,
            Err(e) => {
                summary
                    .skip(ctx, &entry.url, entry.title.as_deref(), &e)
                    .await
            }
        }
    }
}

/// Run a browser driver to completion.
///
/// A navigation failure other than an unreachable start ends the run but
/// keeps what was saved so far; the ledger is still written.
pub async fn drive(
    driver: &dyn BrowserDriver,
    session: &mut dyn BrowserSession,
    ctx: &RunContext,
) -> Result<RunSummary, ScrapeError> {
    let info = driver.info();
    let mut summary = RunSummary::new(&info.name);

    let result = driver.run(session, ctx, &mut summary).await;
    session.close().await;

    match result {
        Ok(()) => {}
        Err(e @ ScrapeError::StartUnreachable { .. }) => return Err(e),
        Err(e) => {
            warn!("{}: run aborted: {}", info.name, e);
            summary.aborted = Some(e.to_string());
        }
    }

    ctx.finalize().await?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tempfile::tempdir;

    use super::*;
    use crate::ledger::Ledger;
    use crate::scrapers::context::RunSettings;
    use crate::scrapers::http_client::fake::{client, StaticTransport};
    use crate::scrapers::pagination::Pagination;
    use crate::scrapers::site::{Processed, Section, SiteInfo};
    use crate::services::{DocumentTarget, Downloader};
    use crate::storage::Storage;

    const START: &str = "https://laws.example/list";

    /// Listing of `a.law` links with a `h1` title on every document page.
    struct Fixture;

    #[async_trait]
    impl ListingSite for Fixture {
        fn info(&self) -> SiteInfo {
            SiteInfo::new("fixture", "Testland", "english", START)
        }

        async fn sections(&self, _ctx: &RunContext) -> Result<Vec<Section>, ScrapeError> {
            Ok(vec![Section::new("all", START)])
        }

        fn pagination(&self, _section: &Section) -> Pagination {
            Pagination::NextLink {
                selector: "a.next".into(),
            }
        }

        fn entries(
            &self,
            page: &Markup,
            _section: &Section,
        ) -> Result<Vec<ListingEntry>, ScrapeError> {
            Ok(page
                .links_in("a.law")?
                .into_iter()
                .map(|l| ListingEntry::new(l.url))
                .collect())
        }

        async fn process(
            &self,
            entry: &ListingEntry,
            ctx: &RunContext,
        ) -> Result<Processed, ScrapeError> {
            let html = ctx.client().get_text(&entry.url).await?;
            let (title, text) = {
                let page = Markup::parse(&html, &entry.url);
                let title = crate::scrapers::markup::inline_text(page.require("h1", "title")?);
                (title, page.text())
            };
            let target = DocumentTarget::new(&title, &entry.url, "english", "Testland");
            let mut processed = Processed::new(&title);
            processed.push(ctx.downloader().save_text(&target, &text).await);
            Ok(processed)
        }
    }

    fn context(root: &std::path::Path, transport: Arc<StaticTransport>) -> RunContext {
        let downloader = Downloader::new(client(transport), Storage::new(root), Ledger::new());
        RunContext::new(downloader, RunSettings::new(root.join("metadata.json")))
    }

    fn listing(links: &[&str], next: Option<&str>) -> String {
        let mut html: String = links
            .iter()
            .map(|l| format!(r#"<a class="law" href="{l}">law</a>"#))
            .collect();
        if let Some(next) = next {
            html.push_str(&format!(r#"<a class="next" href="{next}">Next</a>"#));
        }
        html
    }

    #[tokio::test]
    async fn test_follows_next_links_until_absent() {
        let dir = tempdir().unwrap();
        let transport = Arc::new(
            StaticTransport::new()
                .page(START, &listing(&["/a"], Some("/list?p=2")))
                .page("https://laws.example/list?p=2", &listing(&["/b"], None))
                .page("https://laws.example/a", "<h1>A</h1><p>a</p>")
                .page("https://laws.example/b", "<h1>B</h1><p>b</p>"),
        );
        let ctx = context(dir.path(), transport.clone());

        let summary = crawl(&Fixture, &ctx).await.unwrap();
        assert_eq!(summary.pages_visited, 2);
        assert_eq!(summary.downloaded, 2);
        assert_eq!(transport.requests().len(), 4);
        assert!(dir.path().join("metadata.json").exists());
    }

    #[tokio::test]
    async fn test_unreachable_start_aborts_without_metadata() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path(), Arc::new(StaticTransport::new()));

        let err = crawl(&Fixture, &ctx).await.unwrap_err();
        assert!(!err.is_recoverable());
        assert!(!dir.path().join("metadata.json").exists());
    }

    #[tokio::test]
    async fn test_failed_metadata_write_fails_the_run() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("blocker"), b"not a directory").unwrap();
        let transport = Arc::new(
            StaticTransport::new()
                .page(START, &listing(&["/a"], None))
                .page("https://laws.example/a", "<h1>A</h1><p>a</p>"),
        );
        let ctx = context(dir.path(), transport);
        let ctx = RunContext::new(
            ctx.downloader().clone(),
            RunSettings::new(dir.path().join("blocker").join("metadata.json")),
        );

        let err = crawl(&Fixture, &ctx).await.unwrap_err();
        assert!(matches!(err, ScrapeError::WriteFailed { .. }));
        assert_eq!(ctx.ledger().len(), 1);
    }

    #[tokio::test]
    async fn test_test_run_takes_one_document() {
        let dir = tempdir().unwrap();
        let transport = Arc::new(
            StaticTransport::new()
                .page(START, &listing(&["/a", "/b"], Some("/list?p=2")))
                .page("https://laws.example/a", "<h1>A</h1><p>a</p>"),
        );
        let mut ctx = context(dir.path(), transport.clone());
        ctx = RunContext::new(
            ctx.downloader().clone(),
            RunSettings {
                test_run: true,
                ..ctx.settings().clone()
            },
        );

        let summary = crawl(&Fixture, &ctx).await.unwrap();
        assert_eq!(summary.discovered, 1);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_workers_process_every_entry() {
        let dir = tempdir().unwrap();
        let links: Vec<String> = (0..6).map(|i| format!("/law/{i}")).collect();
        let refs: Vec<&str> = links.iter().map(String::as_str).collect();
        let mut transport = StaticTransport::new().page(START, &listing(&refs, None));
        for i in 0..6 {
            transport = transport.page(
                &format!("https://laws.example/law/{i}"),
                &format!("<h1>Law {i}</h1><p>text {i}</p>"),
            );
        }
        let ctx = context(dir.path(), Arc::new(transport));
        let ctx = RunContext::new(
            ctx.downloader().clone(),
            RunSettings {
                workers: 4,
                ..ctx.settings().clone()
            },
        );

        let summary = crawl(&Fixture, &ctx).await.unwrap();
        assert_eq!(summary.downloaded, 6);
        assert_eq!(ctx.ledger().len(), 6);
    }
}
