//! France: Légifrance codes (legifrance.gouv.fr).
//!
//! The codes list is reached from the home page. Each code's download
//! pictogram opens a viewer tab whose `<object>` embeds the PDF.

use async_trait::async_trait;
use tracing::info;

use crate::error::ScrapeError;
use crate::models::DocumentFormat;
use crate::scrapers::browser::{close_extra_tabs, find_required, open_in_new_tab, ElementHandle};
use crate::scrapers::{
    BrowserDriver, BrowserSession, Processed, RunContext, RunEvent, RunSummary, SiteInfo,
};
use crate::services::DocumentTarget;

const START_URL: &str = "https://www.legifrance.gouv.fr/";
const CODES_LINK: &str = "#main ul li p span a";
const DOWNLOAD: &str = ".picto-download";
const PDF_TITLE: &str = ".pdf-title";
const PDF_OBJECT: &str = "object[data]";

pub struct France;

impl France {
    /// Save the PDF shown in the viewer tab opened by `download`.
    async fn code(
        &self,
        session: &mut dyn BrowserSession,
        ctx: &RunContext,
        download: &ElementHandle,
    ) -> Result<Processed, ScrapeError> {
        open_in_new_tab(session, download).await?;
        let title = find_required(session, PDF_TITLE).await?.remove(0).text;
        let object = find_required(session, PDF_OBJECT).await?.remove(0);
        let viewer = session.current_url().await?;
        let pdf = object
            .attr("data")
            .and_then(|data| url::Url::parse(&viewer).ok()?.join(data).ok())
            .map(|u| u.to_string())
            .ok_or_else(|| ScrapeError::element(&viewer, PDF_OBJECT))?;

        let info = self.info();
        let target = DocumentTarget::new(&title, &pdf, &info.language, &info.country)
            .format(DocumentFormat::Pdf);
        let mut processed = Processed::new(&title);
        processed.push(ctx.downloader().save_remote(&target, &pdf).await);
        Ok(processed)
    }
}

#[async_trait]
impl BrowserDriver for France {
    fn info(&self) -> SiteInfo {
        SiteInfo::new("france", "France", "french", START_URL)
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
        let codes = find_required(session, CODES_LINK)
            .await
            .map_err(|e| ScrapeError::start_unreachable(START_URL, e))?;
        session.click(&codes[0]).await?;

        let list_url = session.current_url().await?;
        let mut downloads = session.find_elements(DOWNLOAD).await?;
        summary.pages_visited += 1;
        ctx.emit(RunEvent::PageVisited {
            url: list_url.clone(),
            entries: downloads.len(),
        })
        .await;
        info!("france: {} codes listed", downloads.len());
        if ctx.test_run() {
            downloads.truncate(1);
        }
        summary.discovered += downloads.len();

        for download in &downloads {
            let result = self.code(session, ctx, download).await;
            close_extra_tabs(session).await?;
            let url = download
                .attr("href")
                .map(str::to_string)
                .unwrap_or_else(|| format!("{list_url}#{}", download.index));
            match result {
                Ok(processed) => summary.absorb(ctx, &url, processed).await,
                Err(e) => summary.skip(ctx, &url, None, &e).await,
            }
        }
        Ok(())
    }
}
