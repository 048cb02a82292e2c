//! Philippines: Official Gazette masterlist generator.
//!
//! The masterlist is queried once per category and president. Each result
//! table row spans five cells: title, text link, (unused), date, PDF link.
//! The text version is always saved; the PDF too when the row links one.

use async_trait::async_trait;

use super::iso_date;
use crate::error::ScrapeError;
use crate::models::{DocumentFormat, ExtraFields};
use crate::scrapers::markup::{inline_text, plain_text};
use crate::scrapers::{
    ListingEntry, ListingSite, Markup, Pagination, Processed, RunContext, Section, SiteInfo,
};
use crate::services::DocumentTarget;

const START_URL: &str = "https://www.officialgazette.gov.ph/masterlist-generator/";
const MASTERLIST: &str = "https://www.officialgazette.gov.ph/masterlist-generator/page/{page}/";
const CELLS_PER_ROW: usize = 5;

const CATEGORIES: &[(&str, &str)] = &[
    ("Executive Issuances", "executive-issuances"),
    ("Proclamations", "proclamations"),
    ("Executive Orders", "executive-orders"),
    ("Memorandum Orders", "memorandum-orders"),
    ("Memorandum Circulars", "memorandum-circulars"),
    ("Republic Acts", "republic-acts"),
    (
        "Implementing Rules and Regulations of Republic Acts",
        "implementing-rules-and-regulations",
    ),
    (
        "Implementing Rules and Regulations of Executive Orders",
        "implementing-rules-and-regulations-executive-orders",
    ),
    ("Presidential Decrees", "presidential-decrees-executive-issuances"),
    ("Letters of Instruction", "letters-of-instruction"),
    ("Letters of Implementation", "letters-of-implementation"),
    ("Administrative Orders", "administrative-orders"),
    ("Speeches", "speeches"),
    ("Special Orders", "special-orders"),
    ("General Orders", "general-orders"),
    ("Other Issuances", "other-issuances"),
    ("Performance-Based Bonus", "performance-based-bonus"),
    (
        "Inter-Agency Task Force for the Management of Emerging Infectious Disease Resolutions",
        "inter-agency-task-force-for-the-management-of-emerging-infectious-diseases-resolutions",
    ),
];

const PRESIDENTS: &[(&str, &str)] = &[
    ("Manuel L. Quezon", "manuel-l-quezon"),
    ("Sergio Osmeña", "sergio-osmena"),
    ("Manuel Roxas", "manuel-roxas"),
    ("Elpidio Quirino", "elpidio-quirino"),
    ("Ramon Magsaysay", "ramon-magsaysay"),
    ("Carlos P. Garcia", "carlos-p-garcia"),
    ("Diosdado Macapagal", "diosdado-macapagal"),
    ("Ferdinand E. Marcos", "ferdinand-e-marcos"),
    ("Corazon C. Aquino", "corazon-c-aquino"),
    ("Fidel V. Ramos", "fidel-v-ramos"),
    ("Joseph Ejercito Estrada", "joseph-ejercito-estrada"),
    ("Gloria Macapagal Arroyo", "gloria-macapagal-arroyo"),
    ("Benigno S. Aquino III", "benigno-s-aquino-iii"),
    ("Rodrigo Roa Duterte", "rodrigo-roa-duterte"),
];

pub struct Philippines;

/// Masterlist URL for one category and president, with a `{page}` slot.
pub fn masterlist_url(category: &str, president: &str) -> String {
    format!("{MASTERLIST}?category={category}&president={president}&per_page=100&on_order=DESC")
}

#[async_trait]
impl ListingSite for Philippines {
    fn info(&self) -> SiteInfo {
        SiteInfo::new("philippines", "Philippines", "english", START_URL)
    }

    async fn sections(&self, _ctx: &RunContext) -> Result<Vec<Section>, ScrapeError> {
        let mut sections = Vec::with_capacity(CATEGORIES.len() * PRESIDENTS.len());
        for (category, category_slug) in CATEGORIES {
            for (president, president_slug) in PRESIDENTS {
                let extra = ExtraFields {
                    category: Some(category.to_string()),
                    president: Some(president.to_string()),
                    ..Default::default()
                };
                sections.push(
                    Section::new(
                        format!("{category} - {president}"),
                        masterlist_url(category_slug, president_slug),
                    )
                    .with_extra(extra),
                );
            }
        }
        Ok(sections)
    }

    fn pagination(&self, _section: &Section) -> Pagination {
        Pagination::page_param("page")
    }

    /// The second-to-last page number link holds the page count.
    fn page_count(&self, page: &Markup) -> Option<u32> {
        let numbers = page.select("a.page-numbers").ok()?;
        let count = numbers.len().checked_sub(2).and_then(|i| numbers.get(i))?;
        inline_text(*count).replace(',', "").parse().ok()
    }

    fn entries(&self, page: &Markup, _section: &Section) -> Result<Vec<ListingEntry>, ScrapeError> {
        let cells = page.select("td")?;
        let mut entries = Vec::new();
        for row in cells.chunks_exact(CELLS_PER_ROW) {
            let title = inline_text(row[0]);
            let Some(text_url) = page.resolve(&inline_text(row[1])) else {
                continue;
            };
            let date = inline_text(row[3]);
            let date_enacted = iso_date(&date, "%B %d, %Y").unwrap_or(date);

            let mut entry = ListingEntry::new(text_url)
                .titled(title)
                .with_extra(ExtraFields {
                    date_enacted: Some(date_enacted).filter(|d| !d.is_empty()),
                    ..Default::default()
                });
            let pdf = page
                .select_in(row[4], "a")?
                .into_iter()
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| page.resolve(href));
            if let Some(pdf) = pdf {
                entry = entry.with_file(pdf);
            }
            entries.push(entry);
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
            .ok_or_else(|| ScrapeError::markup(&entry.url, "issuance title"))?;
        let html = ctx.client().get_text(&entry.url).await?;
        let text = {
            let page = Markup::parse(&html, &entry.url);
            plain_text(page.require("article", "issuance text")?)
        };

        let info = self.info();
        let mut processed = Processed::new(&title);
        let target = DocumentTarget::new(&title, &entry.url, &info.language, &info.country)
            .extra(entry.extra.clone());
        processed.push(ctx.downloader().save_text(&target, &text).await);

        for pdf in &entry.files {
            let target = DocumentTarget::new(&title, pdf, &info.language, &info.country)
                .format(DocumentFormat::Pdf)
                .extra(entry.extra.clone());
            processed.push(ctx.downloader().save_remote(&target, pdf).await);
        }
        Ok(processed)
    }
}
