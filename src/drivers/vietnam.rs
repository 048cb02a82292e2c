//! Vietnam: national legal document database (vbpl.vn), English section.
//!
//! Listings are split by document type (`idLoaiVanBan` 1 to 24) and paged
//! with `Page` until a page shows no documents. A document page offers
//! attachments (downloaded through a JavaScript link) or the full text
//! inline; many also link a Vietnamese version laid out the same way.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::iso_date;
use crate::error::ScrapeError;
use crate::models::{DocumentFormat, ExtraFields};
use crate::scrapers::markup::{inline_text, plain_text};
use crate::scrapers::{
    ListingEntry, ListingSite, Markup, Pagination, Processed, RunContext, Section, SiteInfo,
};
use crate::services::DocumentTarget;
use crate::storage::FileStem;

const START_URL: &str = "https://vbpl.vn/TW/Pages/vbpqen.aspx";
const DOCUMENT_TYPES: u32 = 24;
const DATE_FORMAT: &str = "%d/%m/%Y";

static QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'([^']*)'").unwrap());

pub struct Vietnam;

/// Listing URL for one document type.
pub fn document_type_url(index: u32) -> String {
    format!("https://vbpl.vn/TW/Pages/vanbanTA.aspx?idLoaiVanBan={index}")
}

/// Server path inside a `javascript:downloadfile('name','/path')` link.
fn attachment_path(href: &str) -> Option<&str> {
    let args: Vec<&str> = QUOTED
        .captures_iter(href)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    args.get(1).or(args.last()).copied().filter(|p| !p.is_empty())
}

/// Text after the first colon of a labelled line, e.g. `Published: 01/02/2003`.
fn labelled_value(text: &str) -> Option<&str> {
    text.split_once(':').map(|(_, value)| value.trim())
}

/// What one document page offers for download.
#[derive(Debug, Default)]
struct DocumentFiles {
    attachments: Vec<String>,
    text: Option<String>,
}

impl DocumentFiles {
    fn read(page: &Markup) -> Result<Self, ScrapeError> {
        let attachments = page
            .select("div.vbFile ul li a")?
            .into_iter()
            .filter_map(|a| a.value().attr("href"))
            .filter(|href| !href.contains("iFrame"))
            .filter_map(attachment_path)
            .filter_map(|path| page.resolve(path))
            .collect();
        let text = page.first("div.fulltext")?.map(plain_text);
        Ok(Self { attachments, text })
    }
}

/// Save every attachment of one language version, or its inline text.
///
/// `page` carries the title, language and fields shared by the version's
/// files, with the version's page URL as source link.
async fn save_version(
    page: DocumentTarget,
    files: &DocumentFiles,
    ctx: &RunContext,
    processed: &mut Processed,
) {
    if files.attachments.is_empty() {
        let result = match &files.text {
            Some(text) => ctx.downloader().save_text(&page, text).await,
            None => Err(ScrapeError::markup(&page.source_link, "attachments or full text")),
        };
        processed.push(result);
        return;
    }

    let several = files.attachments.len() > 1;
    for (n, url) in files.attachments.iter().enumerate() {
        let mut target = DocumentTarget {
            source_link: url.clone(),
            format: DocumentFormat::from_url(url),
            ..page.clone()
        };
        if several {
            target = target.stem(FileStem::new(&page.title).with_suffix(format!("__{}", n + 1)));
        }
        processed.push(ctx.downloader().save_remote(&target, url).await);
    }
}

#[async_trait]
impl ListingSite for Vietnam {
    fn info(&self) -> SiteInfo {
        SiteInfo::new("vietnam", "Vietnam", "english", START_URL)
    }

    async fn sections(&self, _ctx: &RunContext) -> Result<Vec<Section>, ScrapeError> {
        Ok((1..=DOCUMENT_TYPES)
            .map(|i| Section::new(format!("document type {i}"), document_type_url(i)))
            .collect())
    }

    fn pagination(&self, _section: &Section) -> Pagination {
        Pagination::page_param("Page")
    }

    fn entries(&self, page: &Markup, _section: &Section) -> Result<Vec<ListingEntry>, ScrapeError> {
        // "1. Law: 312" names the selected type
        let document_type = page
            .first("a.selected span")?
            .map(inline_text)
            .and_then(|t| t.split([':', '.']).nth(1).map(|s| s.trim().to_string()))
            .filter(|t| !t.is_empty());

        let mut entries = Vec::new();
        for item in page.select("ul.listLaw li")? {
            let Some(link) = page
                .select_in(item, "p.title a")?
                .into_iter()
                .find_map(|a| page.link(a))
            else {
                continue;
            };
            let description = page
                .select_in(item, "div.des p")?
                .into_iter()
                .next()
                .map(inline_text)
                .filter(|d| !d.is_empty());

            let mut published = None;
            let mut effective = None;
            for line in page.select_in(item, "p.green")? {
                let text = inline_text(line);
                let date = labelled_value(&text).and_then(|d| iso_date(d, DATE_FORMAT));
                if text.starts_with("Published") {
                    published = date;
                } else if text.starts_with("Effective") {
                    effective = date;
                }
            }

            entries.push(
                ListingEntry::new(link.url)
                    .titled(link.text)
                    .with_extra(ExtraFields {
                        date_enacted: published,
                        date_effective: effective,
                        document_type: document_type.clone(),
                        description,
                        ..Default::default()
                    }),
            );
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
            .ok_or_else(|| ScrapeError::markup(&entry.url, "document title"))?;
        let html = ctx.client().get_text(&entry.url).await?;
        let (files, status, vietnamese) = {
            let page = Markup::parse(&html, &entry.url);
            if page.first("div.fulltext")?.is_none() {
                return Err(ScrapeError::markup(&entry.url, "document body (div.fulltext)"));
            }
            let status = page
                .select("li")?
                .into_iter()
                .find(|li| {
                    page.select_in(*li, "span")
                        .unwrap_or_default()
                        .into_iter()
                        .any(|span| inline_text(span).starts_with("Effective"))
                })
                .map(inline_text)
                .and_then(|text| labelled_value(&text).map(str::to_string))
                .filter(|s| !s.is_empty());
            let vietnamese = page
                .select("a")?
                .into_iter()
                .find(|a| {
                    page.select_in(*a, "b.history")
                        .unwrap_or_default()
                        .into_iter()
                        .any(|b| inline_text(b) == "Vietnamese Documents")
                })
                .and_then(|a| page.link(a))
                .map(|link| link.url);
            (DocumentFiles::read(&page)?, status, vietnamese)
        };

        let extra = ExtraFields {
            status,
            ..Default::default()
        }
        .merge(&entry.extra);
        let country = self.info().country;
        let mut processed = Processed::new(&title);
        let english =
            DocumentTarget::new(&title, &entry.url, "english", &country).extra(extra.clone());
        save_version(english, &files, ctx, &mut processed).await;

        if let Some(url) = vietnamese {
            debug!("Vietnamese version of {}: {}", title, url);
            match ctx.client().get_text(&url).await {
                Ok(html) => {
                    let files = DocumentFiles::read(&Markup::parse(&html, &url))?;
                    let version =
                        DocumentTarget::new(&title, &url, "vietnamese", &country).extra(extra);
                    save_version(version, &files, ctx, &mut processed).await;
                }
                Err(e) => processed.push(Err(e)),
            }
        }
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::testing::{context, TestRoot};
    use crate::scrapers::crawl;
    use crate::scrapers::http_client::fake::StaticTransport;
    use crate::scrapers::pagination::page_url;
    use std::sync::Arc;

    const CONSTITUTION: &str = "https://vbpl.vn/TW/Pages/vbpqen-toanvan.aspx?ItemID=1";
    const DECREE: &str = "https://vbpl.vn/TW/Pages/vbpqen-toanvan.aspx?ItemID=2";
    const VIETNAMESE: &str = "https://vbpl.vn/TW/Pages/vbpq-toanvan.aspx?ItemID=1";

    fn listing() -> String {
        r#"<a class="selected"><span>1. Constitution: 2</span></a>
           <ul class="listLaw">
             <li><p class="title"><a href="/TW/Pages/vbpqen-toanvan.aspx?ItemID=1">Constitution 2013</a></p>
                 <div class="des"><p>The Constitution of the Socialist Republic</p></div>
                 <p class="green"><label>Published:</label> 28/11/2013</p>
                 <p class="green"><label>Effective:</label> 01/01/2014</p></li>
             <li><p class="title"><a href="/TW/Pages/vbpqen-toanvan.aspx?ItemID=2">Decree 5</a></p>
                 <div class="des"><p>A decree</p></div>
                 <p class="green"><label>Published:</label> ...</p></li>
           </ul>"#
            .to_string()
    }

    fn constitution_page() -> &'static str {
        r#"<ul><li><span>Effective: </span>In force</li></ul>
           <a href="/TW/Pages/vbpq-toanvan.aspx?ItemID=1"><b class="history">Vietnamese Documents</b></a>
           <div class="vbFile"><ul>
             <li><a href="javascript:downloadfile('a.pdf','/TW/Lists/Attachments/1/a.pdf');">a.pdf</a></li>
             <li><a href="javascript:viewfile('/iFrame/a.pdf');">Quick view</a></li>
             <li><a href="javascript:downloadfile('b.doc','/TW/Lists/Attachments/1/b.doc');">b.doc</a></li>
           </ul></div>
           <div class="fulltext"><p>Preamble</p></div>"#
    }

    #[test]
    fn test_attachment_path_from_javascript_link() {
        assert_eq!(
            attachment_path("javascript:downloadfile('a.pdf','/TW/Lists/a.pdf');"),
            Some("/TW/Lists/a.pdf")
        );
        assert_eq!(attachment_path("javascript:void(0)"), None);
    }

    #[test]
    fn test_entries_with_dates_and_type() {
        let page = Markup::parse(&listing(), &document_type_url(1));
        let section = Section::new("document type 1", document_type_url(1));
        let entries = Vietnam.entries(&page, &section).unwrap();
        assert_eq!(entries.len(), 2);
        let first = &entries[0].extra;
        assert_eq!(first.date_enacted.as_deref(), Some("2013-11-28"));
        assert_eq!(first.date_effective.as_deref(), Some("2014-01-01"));
        assert_eq!(first.document_type.as_deref(), Some("Constitution"));
        assert_eq!(
            first.description.as_deref(),
            Some("The Constitution of the Socialist Republic")
        );
        assert_eq!(entries[1].extra.date_enacted, None);
    }

    #[tokio::test]
    async fn test_english_and_vietnamese_versions() {
        let root = TestRoot::new();
        let transport = Arc::new(
            StaticTransport::new()
                .page(&page_url(&document_type_url(1), "Page", 1), &listing())
                .page(&page_url(&document_type_url(1), "Page", 2), "<ul class=\"listLaw\"></ul>")
                .page(CONSTITUTION, constitution_page())
                .page(DECREE, "<p>Page not found</p>")
                .file(
                    "https://vbpl.vn/TW/Lists/Attachments/1/a.pdf",
                    b"%PDF-1.4 a",
                    "application/pdf",
                )
                .file(
                    "https://vbpl.vn/TW/Lists/Attachments/1/b.doc",
                    b"\xD0\xCF\x11\xE0 doc",
                    "application/msword",
                )
                .page(VIETNAMESE, r#"<div class="fulltext"><p>Lời nói đầu</p></div>"#),
        );
        let ctx = context(&root, transport.clone());

        let summary = crawl(&Vietnam, &ctx).await.unwrap();
        assert_eq!(summary.downloaded, 3);
        assert_eq!(
            transport.count(&page_url(&document_type_url(1), "Page", 3)),
            0
        );
        assert!(summary
            .skipped
            .iter()
            .any(|s| s.url == DECREE && s.kind == "markup_not_found"));

        let records = ctx.ledger().records();
        let paths: Vec<String> = records
            .iter()
            .map(|r| r.download_path.display().to_string())
            .collect();
        assert!(paths.iter().any(|p| p.contains("constitution-2013__1")));
        assert!(paths.iter().any(|p| p.contains("constitution-2013__2")));
        let vietnamese = records.iter().find(|r| r.language == "vietnamese").unwrap();
        assert_eq!(vietnamese.source_link, VIETNAMESE);
        assert_eq!(vietnamese.status.as_deref(), Some("In force"));
        assert!(records
            .iter()
            .all(|r| r.document_type.as_deref() == Some("Constitution")));
    }
}
