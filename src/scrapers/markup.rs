//! HTML markup extraction over `scraper`.
//!
//! `scraper::Html` is not `Send`, so a [`Markup`] must never be held across
//! an `.await`. Parse, pull out owned values, and drop it inside a sync scope.

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::error::ScrapeError;

/// An anchor resolved against its page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub text: String,
    pub title: Option<String>,
}

/// A parsed HTML page and the URL it came from.
pub struct Markup {
    html: Html,
    url: String,
    base: Option<Url>,
}

impl Markup {
    pub fn parse(html: &str, url: &str) -> Self {
        Self {
            html: Html::parse_document(html),
            url: url.to_string(),
            base: Url::parse(url).ok(),
        }
    }

    /// URL this page was fetched from.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn selector(&self, css: &str) -> Result<Selector, ScrapeError> {
        Selector::parse(css)
            .map_err(|e| ScrapeError::markup(&self.url, format!("invalid selector {css}: {e}")))
    }

    /// All elements matching a CSS selector.
    pub fn select(&self, css: &str) -> Result<Vec<ElementRef<'_>>, ScrapeError> {
        let selector = self.selector(css)?;
        Ok(self.html.select(&selector).collect())
    }

    /// Elements with the given tag, optionally filtered on an attribute value.
    pub fn elements(
        &self,
        tag: &str,
        attr: Option<(&str, &str)>,
    ) -> Result<Vec<ElementRef<'_>>, ScrapeError> {
        let selector = self.selector(tag)?;
        Ok(self
            .html
            .select(&selector)
            .filter(|el| match attr {
                Some((name, value)) => el.value().attr(name) == Some(value),
                None => true,
            })
            .collect())
    }

    pub fn first(&self, css: &str) -> Result<Option<ElementRef<'_>>, ScrapeError> {
        let selector = self.selector(css)?;
        Ok(self.html.select(&selector).next())
    }

    /// First match, or `MarkupNotFound` naming `what`.
    pub fn require(&self, css: &str, what: &str) -> Result<ElementRef<'_>, ScrapeError> {
        self.first(css)?
            .ok_or_else(|| ScrapeError::markup(&self.url, format!("{what} ({css})")))
    }

    /// Isolate a structural subtree, e.g. a table body or a named section.
    pub fn section(&self, css: &str) -> Result<ElementRef<'_>, ScrapeError> {
        self.require(css, "section")
    }

    /// Matches of `css` inside `scope`.
    pub fn select_in<'a>(
        &self,
        scope: ElementRef<'a>,
        css: &str,
    ) -> Result<Vec<ElementRef<'a>>, ScrapeError> {
        let selector = self.selector(css)?;
        Ok(scope.select(&selector).collect())
    }

    /// Plain text of the whole document, script and style stripped.
    pub fn text(&self) -> String {
        plain_text(self.html.root_element())
    }

    /// Text of every `<p>`, one paragraph per line.
    pub fn paragraph_text(&self) -> String {
        self.select("p")
            .unwrap_or_default()
            .into_iter()
            .map(inline_text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Resolve an href against this page.
    pub fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            return None;
        }
        match &self.base {
            Some(base) => base.join(href).ok().map(|u| u.to_string()),
            None => Url::parse(href).ok().map(|u| u.to_string()),
        }
    }

    /// Build a link from an anchor element.
    pub fn link(&self, anchor: ElementRef<'_>) -> Option<Link> {
        let href = anchor.value().attr("href")?;
        Some(Link {
            url: self.resolve(href)?,
            text: inline_text(anchor),
            title: anchor.value().attr("title").map(|t| t.trim().to_string()),
        })
    }

    /// Every resolvable `a[href]` on the page.
    pub fn links(&self) -> Vec<Link> {
        self.links_in("a[href]").unwrap_or_default()
    }

    /// Resolvable anchors matching `css`.
    pub fn links_in(&self, css: &str) -> Result<Vec<Link>, ScrapeError> {
        Ok(self
            .select(css)?
            .into_iter()
            .filter_map(|a| self.link(a))
            .collect())
    }
}

/// Element text with all whitespace runs collapsed; for titles and cells.
pub fn inline_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Element text with block structure kept as lines; for law bodies.
pub fn plain_text(el: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(el, &mut raw);
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

const SKIPPED: &[&str] = &["script", "style", "noscript", "template", "head"];
const BLOCKS: &[&str] = &[
    "p", "div", "br", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "table", "ul", "ol",
    "section", "article", "pre", "blockquote", "dd", "dt",
];

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => {
                let name = element.name();
                if SKIPPED.contains(&name) {
                    continue;
                }
                let block = BLOCKS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}
