//! A listing site assembled from a `[drivers.<name>]` table.

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::config::SiteConfig;
use super::context::RunContext;
use super::markup::{inline_text, plain_text, Markup};
use super::pagination::Pagination;
use super::site::{ListingEntry, ListingSite, Processed, Section, SiteInfo};
use crate::error::ScrapeError;
use crate::models::DocumentFormat;
use crate::services::DocumentTarget;

/// Listing site driven entirely by configuration.
///
/// Document pages yield a PDF when `pdf_selector` matches, text when
/// `text_selector` matches, or both; links that already point at a file
/// are saved directly.
pub struct ConfiguredSite {
    name: String,
    config: SiteConfig,
    link_pattern: Option<Regex>,
}

impl ConfiguredSite {
    pub fn new(name: &str, config: SiteConfig) -> Result<Self, regex::Error> {
        let link_pattern = config.link_pattern.as_deref().map(Regex::new).transpose()?;
        Ok(Self {
            name: name.to_string(),
            config,
            link_pattern,
        })
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    fn target(&self, title: &str, link: &str) -> DocumentTarget {
        DocumentTarget::new(title, link, &self.config.language, &self.config.country)
    }
}

/// What a document page offers.
struct DocumentPage {
    title: Option<String>,
    pdf: Option<String>,
    text: Option<String>,
}

#[async_trait]
impl ListingSite for ConfiguredSite {
    fn info(&self) -> SiteInfo {
        SiteInfo::new(
            &self.name,
            &self.config.country,
            &self.config.language,
            &self.config.start_url,
        )
    }

    async fn sections(&self, _ctx: &RunContext) -> Result<Vec<Section>, ScrapeError> {
        Ok(vec![Section::new(&self.name, &self.config.start_url)])
    }

    fn pagination(&self, _section: &Section) -> Pagination {
        self.config.pagination.clone()
    }

    fn entries(&self, page: &Markup, _section: &Section) -> Result<Vec<ListingEntry>, ScrapeError> {
        let mut seen = std::collections::HashSet::new();
        Ok(page
            .links_in(&self.config.entry_selector)?
            .into_iter()
            .filter(|link| link.url != page.url())
            .filter(|link| {
                self.link_pattern
                    .as_ref()
                    .is_none_or(|re| re.is_match(&link.url))
            })
            .filter(|link| seen.insert(link.url.clone()))
            .map(|link| {
                let title = link.title.clone().unwrap_or(link.text.clone());
                ListingEntry::new(link.url).titled(title)
            })
            .collect())
    }

    async fn process(
        &self,
        entry: &ListingEntry,
        ctx: &RunContext,
    ) -> Result<Processed, ScrapeError> {
        if let Some(format) = DocumentFormat::from_url(&entry.url) {
            if format != DocumentFormat::Html {
                let title = entry.title.clone().unwrap_or_else(|| entry.url.clone());
                let target = self.target(&title, &entry.url).format(format);
                let mut processed = Processed::new(&title);
                processed.push(ctx.downloader().save_remote(&target, &entry.url).await);
                return Ok(processed);
            }
        }

        let html = ctx.client().get_text(&entry.url).await?;
        let found = {
            let page = Markup::parse(&html, &entry.url);
            let title = match &self.config.title_selector {
                Some(css) => Some(inline_text(page.require(css, "title")?)),
                None => entry.title.clone(),
            };
            let pdf = match &self.config.pdf_selector {
                Some(css) => page.links_in(css)?.into_iter().next().map(|l| l.url),
                None => None,
            };
            let text = match &self.config.text_selector {
                Some(css) => page.first(css)?.map(plain_text),
                None => None,
            };
            DocumentPage { title, pdf, text }
        };

        let title = found
            .title
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ScrapeError::markup(&entry.url, "title"))?;
        let mut processed = Processed::new(&title);

        if let Some(pdf) = &found.pdf {
            debug!("PDF for {}: {}", title, pdf);
            let target = self.target(&title, pdf).format(DocumentFormat::Pdf);
            processed.push(ctx.downloader().save_remote(&target, pdf).await);
        }
        if let Some(text) = &found.text {
            let target = self.target(&title, &entry.url);
            processed.push(ctx.downloader().save_text(&target, text).await);
        }
        if found.pdf.is_none() && found.text.is_none() {
            return Err(ScrapeError::markup(&entry.url, "document PDF link or text"));
        }
        Ok(processed)
    }
}
