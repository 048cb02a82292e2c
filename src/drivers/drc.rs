//! Democratic Republic of the Congo: Leganet legislation index (leganet.cd).
//!
//! Every "Texte" link on the legislation page opens a new tab holding either
//! a PDF or an HTML transcription. HTML pages are laid out by hand, so the
//! title is looked for in a few places inside the content cell.

use async_trait::async_trait;
use tracing::info;
use url::Url;

use crate::error::ScrapeError;
use crate::models::DocumentFormat;
use crate::scrapers::browser::{close_extra_tabs, find_required, open_in_new_tab, ElementHandle};
use crate::scrapers::markup::inline_text;
use crate::scrapers::{
    BrowserDriver, BrowserSession, Markup, Processed, RunContext, RunEvent, RunSummary, SiteInfo,
};
use crate::services::DocumentTarget;
use crate::storage::FileStem;

const START_URL: &str = "http://www.leganet.cd/JO.htm";
const LEGISLATION: &str = r#"img[alt="Législation"]"#;
const CONTENT_CELL: &str = "body > table:nth-of-type(2) > tbody > tr > td:nth-of-type(3)";
const TITLE_PATHS: &[&str] = &["p", "span > p", "div > dl", "dl > dt", "font > b > p"];
const TITLE_CHARS: usize = 250;
const EXCERPT_CHARS: usize = 250;

pub struct Drc;

fn is_text_link(anchor: &ElementHandle) -> bool {
    ["Texte", "texte", "pdf"]
        .iter()
        .any(|needle| anchor.text.contains(needle))
}

/// Title of a PDF law: its URL path without the extension.
fn pdf_title(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let path = parsed.path().trim_start_matches('/');
    let stem = path.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(path);
    (!stem.is_empty()).then(|| stem.to_string())
}

/// Title of an HTML law, from the first content-cell location that has text.
fn html_title(page: &Markup) -> Result<Option<String>, ScrapeError> {
    for path in TITLE_PATHS {
        if let Some(el) = page.first(&format!("{CONTENT_CELL} > {path}"))? {
            let title = inline_text(el);
            if !title.is_empty() {
                return Ok(Some(title.chars().take(TITLE_CHARS).collect()));
            }
        }
    }
    Ok(None)
}

/// A slice from the middle of the text; titles repeat across laws.
fn middle_excerpt(text: &str) -> String {
    let chars = text.chars().count();
    text.chars().skip(chars / 2).take(EXCERPT_CHARS).collect()
}

impl Drc {
    async fn law(
        &self,
        session: &mut dyn BrowserSession,
        ctx: &RunContext,
        link: &ElementHandle,
    ) -> Result<Processed, ScrapeError> {
        open_in_new_tab(session, link).await?;
        let url = session.current_url().await?;
        let info = self.info();

        if url.contains("pdf") {
            let title = pdf_title(&url).ok_or_else(|| ScrapeError::markup(&url, "PDF name"))?;
            let target = DocumentTarget::new(&title, &url, &info.language, &info.country)
                .format(DocumentFormat::Pdf);
            let mut processed = Processed::new(&title);
            processed.push(ctx.downloader().save_remote(&target, &url).await);
            return Ok(processed);
        }

        let html = session.page_source().await?;
        let (title, text) = {
            let page = Markup::parse(&html, &url);
            let title = html_title(&page)?.ok_or_else(|| ScrapeError::markup(&url, "law title"))?;
            (title, page.text())
        };
        let target = DocumentTarget::new(&title, &url, &info.language, &info.country)
            .stem(FileStem::new(&title).with_excerpt(middle_excerpt(&text)));
        let mut processed = Processed::new(&title);
        processed.push(ctx.downloader().save_text(&target, &text).await);
        Ok(processed)
    }
}

#[async_trait]
impl BrowserDriver for Drc {
    fn info(&self) -> SiteInfo {
        SiteInfo::new("drc", "DRC", "french", START_URL)
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
        let legislation = find_required(session, LEGISLATION)
            .await
            .map_err(|e| ScrapeError::start_unreachable(START_URL, e))?;
        session.click(&legislation[0]).await?;

        let list_url = session.current_url().await?;
        let mut links: Vec<ElementHandle> = session
            .find_elements("a")
            .await?
            .into_iter()
            .filter(is_text_link)
            .collect();
        summary.pages_visited += 1;
        ctx.emit(RunEvent::PageVisited {
            url: list_url.clone(),
            entries: links.len(),
        })
        .await;
        info!("drc: {} laws listed", links.len());
        if ctx.test_run() {
            links.truncate(1);
        }
        summary.discovered += links.len();

        for link in &links {
            let result = self.law(session, ctx, link).await;
            close_extra_tabs(session).await?;
            let url = link
                .attr("href")
                .and_then(|href| Url::parse(&list_url).ok()?.join(href).ok())
                .map(|u| u.to_string())
                .unwrap_or_else(|| list_url.clone());
            match result {
                Ok(processed) => summary.absorb(ctx, &url, processed).await,
                Err(e) => summary.skip(ctx, &url, None, &e).await,
            }
        }
        Ok(())
    }
}
