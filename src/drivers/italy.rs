//! Italy: Normattiva, the Constitution and the codes.
//!
//! Normattiva refuses clients without a live browser session, so every page
//! goes through the browser. A code's full text sits behind "atto completo"
//! (opened in a new tab) and the "Visualizza" button.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use super::iso_date;
use crate::error::ScrapeError;
use crate::models::ExtraFields;
use crate::scrapers::browser::{find_by_text, find_required, switch_to_last_tab};
use crate::scrapers::markup::{inline_text, plain_text};
use crate::scrapers::{
    BrowserDriver, BrowserSession, Markup, Processed, RunContext, RunEvent, RunSummary, SiteInfo,
};
use crate::services::DocumentTarget;

const CODES_URL: &str = "https://www.normattiva.it/staticPage/codici";
const VIEW_BUTTON: &str = "input[value=Visualizza]";
const FULL_TEXT: &str = ".wrapper_pre";

static URN_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":(\d{4}-\d{2}-\d{2});").unwrap());
static LAST_UPDATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Ultimo aggiornamento all'atto pubblicato il (\d{2}/\d{2}/\d{4})").unwrap()
});
static IN_FORCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Entrata in vigore del provvedimento: (\d{2}/\d{2}/\d{4})").unwrap()
});

pub struct Italy;

/// A code listed on the codes page.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Code {
    url: String,
    name: String,
}

fn captured(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Enactment and update dates shown on a code's page.
fn code_dates(url: &str, html: &str) -> ExtraFields {
    let date_enacted = captured(&URN_DATE, url)
        .or_else(|| captured(&IN_FORCE, html).and_then(|d| iso_date(&d, "%d/%m/%Y")));
    let last_updated = captured(&LAST_UPDATED, html).and_then(|d| iso_date(&d, "%d/%m/%Y"));
    ExtraFields {
        date_enacted,
        last_updated,
        ..Default::default()
    }
}

impl Italy {
    async fn codes(&self, session: &mut dyn BrowserSession) -> Result<Vec<Code>, ScrapeError> {
        let html = session.page_source().await?;
        let page = Markup::parse(&html, CODES_URL);
        Ok(page
            .select("a[href*=uri-res]")?
            .into_iter()
            .filter_map(|a| {
                let link = page.link(a)?;
                Some(Code {
                    url: link.url,
                    name: inline_text(a),
                })
            })
            .collect())
    }

    async fn code(
        &self,
        session: &mut dyn BrowserSession,
        ctx: &RunContext,
        code: &Code,
    ) -> Result<Processed, ScrapeError> {
        session.switch_to_tab(0).await?;
        session.navigate(&code.url).await?;
        let landed = session.current_url().await?;
        let extra = code_dates(&landed, &session.page_source().await?);
        debug!("{}: {:?}", code.name, extra);

        let complete = find_by_text(session, "a", "atto completo").await?;
        session.click(&complete).await?;
        switch_to_last_tab(session).await?;
        let view = find_required(session, VIEW_BUTTON).await?.remove(0);
        session.click(&view).await?;

        let html = session.page_source().await?;
        let url = session.current_url().await?;
        let text = {
            let page = Markup::parse(&html, &url);
            plain_text(page.require(FULL_TEXT, "code text")?)
        };

        let info = self.info();
        let target =
            DocumentTarget::new(&code.name, &code.url, &info.language, &info.country).extra(extra);
        let mut processed = Processed::new(&code.name);
        processed.push(ctx.downloader().save_text(&target, &text).await);
        Ok(processed)
    }
}

#[async_trait]
impl BrowserDriver for Italy {
    fn info(&self) -> SiteInfo {
        SiteInfo::new("italy", "Italy", "italian", CODES_URL)
    }

    async fn run(
        &self,
        session: &mut dyn BrowserSession,
        ctx: &RunContext,
        summary: &mut RunSummary,
    ) -> Result<(), ScrapeError> {
        session
            .navigate(CODES_URL)
            .await
            .map_err(|e| ScrapeError::start_unreachable(CODES_URL, e.into()))?;
        let mut codes = self.codes(session).await?;
        summary.pages_visited += 1;
        ctx.emit(RunEvent::PageVisited {
            url: CODES_URL.to_string(),
            entries: codes.len(),
        })
        .await;
        info!("italy: {} codes listed", codes.len());

        if ctx.test_run() {
            codes.truncate(1);
        }
        summary.discovered += codes.len();
        for code in &codes {
            match self.code(session, ctx, code).await {
                Ok(processed) => summary.absorb(ctx, &code.url, processed).await,
                Err(e) => summary.skip(ctx, &code.url, Some(code.name.as_str()), &e).await,
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

    const CIVIL: &str = "https://www.normattiva.it/uri-res/N2Ls?urn:nir:stato:regio.decreto:1942-03-16;262";
    const NAVIGATION: &str = "https://www.normattiva.it/uri-res/N2Ls?urn:nir:stato:regio.decreto:1942;327";

    fn site() -> ReplaySession {
        let mut session = ReplaySession::new();
        session.add_page(
            CODES_URL,
            &format!(
                r#"<h2>Costituzione e Codici</h2>
                   <a href="{CIVIL}">Codice civile</a>
                   <a href="/uri-res/N2Ls?urn:nir:stato:regio.decreto:1942;327">Codice della navigazione</a>
                   <a href="/staticPage/chi-siamo">Chi siamo</a>"#
            ),
        );
        session.add_page(
            CIVIL,
            r#"<p>(Ultimo aggiornamento all'atto pubblicato il 05/08/2022)</p>
               <a href="/atto/caricaArticolo?civile" target="_blank">atto completo</a>"#,
        );
        session.add_page(
            "https://www.normattiva.it/atto/caricaArticolo?civile",
            r#"<form><input type="submit" value="Visualizza" data-nav="/atto/vediMenuHTML?civile"></form>"#,
        );
        session.add_page(
            "https://www.normattiva.it/atto/vediMenuHTML?civile",
            r#"<div class="wrapper_pre"><pre>Art. 1
Capacità giuridica</pre></div>"#,
        );
        session.add_page(NAVIGATION, "<p>Entrata in vigore del provvedimento: 21/04/1942.</p>");
        session
    }

    #[test]
    fn test_dates_from_urn_and_page() {
        let dates = code_dates(CIVIL, "Ultimo aggiornamento all'atto pubblicato il 05/08/2022)");
        assert_eq!(dates.date_enacted.as_deref(), Some("1942-03-16"));
        assert_eq!(dates.last_updated.as_deref(), Some("2022-08-05"));

        let dates = code_dates(NAVIGATION, "Entrata in vigore del provvedimento: 21/04/1942.");
        assert_eq!(dates.date_enacted.as_deref(), Some("1942-04-21"));
    }

    #[tokio::test]
    async fn test_full_text_through_new_tab() {
        let root = TestRoot::new();
        let ctx = context(&root, Arc::new(StaticTransport::new()));
        let mut session = site();

        let summary = drive(&Italy, &mut session, &ctx).await.unwrap();
        assert_eq!(summary.discovered, 2);
        assert_eq!(summary.downloaded, 1);
        // the navigation code has no "atto completo" link
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].kind, "automation_element_not_found");

        let record = &ctx.ledger().records()[0];
        assert_eq!(record.title, "Codice civile");
        assert_eq!(record.language, "italian");
        assert_eq!(record.date_enacted.as_deref(), Some("1942-03-16"));
        assert_eq!(record.last_updated.as_deref(), Some("2022-08-05"));
        let text = std::fs::read_to_string(&record.download_path).unwrap();
        assert!(text.contains("Capacità giuridica"));
    }
}
