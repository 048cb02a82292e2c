//! Belgium: the Belgian Official Journal (ejustice.just.fgov.be).
//!
//! The site is a frameset: listings and laws load in the `Body` frame and
//! the navigation buttons sit in the `Foot` frame. Every law is reached by
//! clicking it from a dated summary, so laws share one source URL. Summaries
//! are walked backwards with "previous summary" until the publication date
//! stops changing or the button disappears.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::ScrapeError;
use crate::scrapers::browser::find_required;
use crate::scrapers::markup::inline_text;
use crate::scrapers::pagination::StopReason;
use crate::scrapers::{
    BrowserDriver, BrowserSession, Markup, PageCursor, PageObservation, Pagination, Processed,
    RunContext, RunEvent, RunSummary, SiteInfo,
};
use crate::services::DocumentTarget;
use crate::storage::FileStem;

const START_URL: &str = "http://www.ejustice.just.fgov.be/cgi/welcome.pl";
/// Laws open through a form post, so every law page has this address.
const SOURCE_LINK: &str = "www.ejustice.just.fgov.be/cgi/article.pl";

const BODY_FRAME: &str = "frame[name=Body]";
const FOOT_FRAME: &str = "frame[name=Foot]";
const LAW_BUTTON: &str = "input[type=submit][name=numac]";
const TITLE: &str = "h3 center u";
const BACK_BUTTONS: &str = "td:nth-of-type(4) form input";
const BACK_INDEX: usize = 4;
const PUB_DATE: &str = "input[type=text][name=pub_date]";
const NEXT_BUTTONS: &str = "input[type=Submit]";
const NEXT_LABELS: &[&str] = &["Sommaire précédent", "Vorige Inhoud", "Voriger Inhalt"];

/// Characters of the page text used to tell same-titled laws apart.
const EXCERPT: std::ops::Range<usize> = 300..500;

/// Languages the journal is published in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BelgianLanguage {
    French,
    Dutch,
    German,
}

impl BelgianLanguage {
    pub const ALL: [BelgianLanguage; 3] = [Self::French, Self::Dutch, Self::German];

    /// Language recorded in the ledger.
    pub fn name(&self) -> &'static str {
        match self {
            Self::French => "french",
            Self::Dutch => "dutch",
            Self::German => "german",
        }
    }

    /// Label of the welcome page button for this language.
    pub fn label(&self) -> &'static str {
        match self {
            Self::French => "Français",
            Self::Dutch => "Nederlands",
            Self::German => "Deutsch",
        }
    }
}

pub struct Belgium {
    languages: Vec<BelgianLanguage>,
}

impl Belgium {
    pub fn new(languages: Vec<BelgianLanguage>) -> Self {
        Self { languages }
    }

    pub fn all_languages() -> Self {
        Self::new(BelgianLanguage::ALL.to_vec())
    }

    async fn frame(session: &mut dyn BrowserSession, frame: &str) -> Result<(), ScrapeError> {
        session.switch_to_default().await?;
        session.switch_to_frame(frame).await?;
        Ok(())
    }

    /// Walk every summary of one language.
    async fn language(
        &self,
        session: &mut dyn BrowserSession,
        ctx: &RunContext,
        summary: &mut RunSummary,
        language: BelgianLanguage,
    ) -> Result<(), ScrapeError> {
        let selector = format!("input[type=Submit][value=\"{}\"]", language.label());
        let button = find_required(session, &selector).await?.remove(0);
        session.click(&button).await?;

        let listing = session.current_url().await?;
        let pagination = Pagination::RepeatedCursor {
            cursor: PUB_DATE.to_string(),
            next: NEXT_BUTTONS.to_string(),
        };
        let mut cursor = PageCursor::new(pagination, &listing);

        loop {
            Self::frame(session, BODY_FRAME).await?;
            let mut count = session.find_elements(LAW_BUTTON).await?.len();
            summary.pages_visited += 1;
            ctx.emit(RunEvent::PageVisited {
                url: session.current_url().await?,
                entries: count,
            })
            .await;
            if ctx.test_run() {
                count = count.min(1);
            }
            summary.discovered += count;

            for i in 0..count {
                let Some(law) = session.find_elements(LAW_BUTTON).await?.into_iter().nth(i) else {
                    break;
                };
                session.click(&law).await?;
                Self::frame(session, BODY_FRAME).await?;
                match self.law(session, ctx, language).await {
                    Ok(processed) => summary.absorb(ctx, SOURCE_LINK, processed).await,
                    Err(e) => summary.skip(ctx, SOURCE_LINK, None, &e).await,
                }

                Self::frame(session, FOOT_FRAME).await?;
                let back = find_required(session, BACK_BUTTONS).await?;
                let back = back.get(BACK_INDEX).ok_or_else(|| {
                    ScrapeError::element(&listing, format!("{BACK_BUTTONS} (#{})", BACK_INDEX + 1))
                })?;
                session.click(back).await?;
                Self::frame(session, BODY_FRAME).await?;
            }

            if ctx.test_run() {
                break;
            }
            Self::frame(session, FOOT_FRAME).await?;
            let published = session
                .find_elements(PUB_DATE)
                .await?
                .into_iter()
                .next()
                .and_then(|el| el.attr("value").map(|v| v.trim().to_string()));
            let next = session
                .find_elements(NEXT_BUTTONS)
                .await?
                .into_iter()
                .find(|el| el.attr("value").is_some_and(|v| NEXT_LABELS.contains(&v)));
            let Some(next) = next else {
                debug!("{}: {:?}", language.name(), StopReason::NoNextLink);
                break;
            };
            let observed = PageObservation::new(count).with_cursor(published);
            if cursor.advance(&observed).is_none() {
                break;
            }
            session.click(&next).await?;
        }
        Ok(())
    }

    /// Save the law shown in the body frame.
    async fn law(
        &self,
        session: &mut dyn BrowserSession,
        ctx: &RunContext,
        language: BelgianLanguage,
    ) -> Result<Processed, ScrapeError> {
        let html = session.page_source().await?;
        let url = session.current_url().await?;
        let (title, text) = {
            let page = Markup::parse(&html, &url);
            (inline_text(page.require(TITLE, "law title")?), page.text())
        };
        let excerpt: String = text
            .chars()
            .skip(EXCERPT.start)
            .take(EXCERPT.end - EXCERPT.start)
            .collect();
        debug!("{}: {}", title, excerpt);

        let target = DocumentTarget::new(&title, SOURCE_LINK, language.name(), &self.info().country)
            .stem(FileStem::new(&title).with_excerpt(excerpt));
        let mut processed = Processed::new(&title);
        processed.push(ctx.downloader().save_text(&target, &text).await);
        Ok(processed)
    }
}

#[async_trait]
impl BrowserDriver for Belgium {
    fn info(&self) -> SiteInfo {
        SiteInfo::new("belgium", "Belgium", "french", START_URL)
    }

    async fn run(
        &self,
        session: &mut dyn BrowserSession,
        ctx: &RunContext,
        summary: &mut RunSummary,
    ) -> Result<(), ScrapeError> {
        let languages = if ctx.test_run() {
            &self.languages[..self.languages.len().min(1)]
        } else {
            &self.languages[..]
        };
        for (i, language) in languages.iter().enumerate() {
            info!("belgium: laws in {}", language.name());
            ctx.emit(RunEvent::SectionStarted {
                label: language.name().to_string(),
            })
            .await;
            match session.navigate(START_URL).await {
                Ok(()) => {}
                Err(e) if i == 0 => return Err(ScrapeError::start_unreachable(START_URL, e.into())),
                Err(e) => return Err(e.into()),
            }
            self.language(session, ctx, summary, *language).await?;
            ctx.checkpoint().await;
        }
        Ok(())
    }
}
