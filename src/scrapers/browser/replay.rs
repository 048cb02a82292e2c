//! In-memory browser session over canned pages.
//!
//! Clicking an element follows its `href` (or that of the enclosing link),
//! or its `data-nav` attribute for form buttons; `target="_blank"` opens a
//! new tab and `target="_top"` replaces the whole frameset. Frames are resolved through their `src`.
//! Useful for dry runs against saved pages and for exercising browser
//! drivers without Chrome.

use std::collections::HashMap;

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use super::{BrowserError, BrowserSession, ElementHandle};
use crate::scrapers::markup::inline_text;

#[derive(Debug, Clone)]
struct Tab {
    url: String,
    /// Frame document URLs, outermost first.
    frames: Vec<String>,
}

/// A [`BrowserSession`] that serves pages from memory.
#[derive(Debug, Default)]
pub struct ReplaySession {
    pages: HashMap<String, String>,
    tabs: Vec<Tab>,
    current: usize,
    visits: Vec<String>,
}

fn normalize(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

impl ReplaySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the HTML served for `url`.
    pub fn add_page(&mut self, url: &str, html: &str) {
        self.pages.insert(normalize(url), html.to_string());
    }

    /// Every document URL loaded so far, in order.
    pub fn visits(&self) -> &[String] {
        &self.visits
    }

    fn tab(&self) -> Result<&Tab, BrowserError> {
        self.tabs.get(self.current).ok_or(BrowserError::NoSuchTab {
            index: self.current,
            count: self.tabs.len(),
        })
    }

    fn document_url(&self) -> Result<String, BrowserError> {
        let tab = self.tab()?;
        Ok(tab.frames.last().unwrap_or(&tab.url).clone())
    }

    fn document(&self) -> Result<(String, &str), BrowserError> {
        let url = self.document_url()?;
        let html = self
            .pages
            .get(&url)
            .ok_or_else(|| BrowserError::Navigation {
                url: url.clone(),
                message: "no canned page".to_string(),
            })?;
        Ok((url, html.as_str()))
    }

    fn load(&mut self, url: &str) -> Result<String, BrowserError> {
        let url = normalize(url);
        if !self.pages.contains_key(&url) {
            return Err(BrowserError::Navigation {
                url,
                message: "no canned page".to_string(),
            });
        }
        self.visits.push(url.clone());
        Ok(url)
    }

    fn query(
        html: &str,
        selector: &str,
    ) -> Result<Vec<(String, HashMap<String, String>)>, BrowserError> {
        let parsed = Selector::parse(selector)
            .map_err(|e| BrowserError::Protocol(format!("invalid selector {selector}: {e}")))?;
        let document = Html::parse_document(html);
        Ok(document
            .select(&parsed)
            .map(|el| {
                let attributes = el
                    .value()
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                (inline_text(el), attributes)
            })
            .collect())
    }
}

impl ReplaySession {
    /// Attributes of the element a click lands on: the element itself, or
    /// the closest enclosing link.
    fn click_target(
        html: &str,
        element: &ElementHandle,
    ) -> Result<Option<HashMap<String, String>>, BrowserError> {
        let parsed = Selector::parse(&element.selector).map_err(|e| {
            BrowserError::Protocol(format!("invalid selector {}: {e}", element.selector))
        })?;
        let document = Html::parse_document(html);
        let el = document
            .select(&parsed)
            .nth(element.index)
            .ok_or_else(|| BrowserError::StaleElement {
                selector: element.selector.clone(),
                index: element.index,
            })?;
        let attrs = |el: scraper::ElementRef<'_>| -> HashMap<String, String> {
            el.value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };
        let own = attrs(el);
        if own.contains_key("href") || own.contains_key("data-nav") {
            return Ok(Some(own));
        }
        Ok(el
            .ancestors()
            .filter_map(scraper::ElementRef::wrap)
            .find(|a| a.value().name() == "a" && a.value().attr("href").is_some())
            .map(attrs))
    }
}

#[async_trait]
impl BrowserSession for ReplaySession {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        let url = self.load(url)?;
        match self.tabs.get_mut(self.current) {
            Some(tab) => {
                tab.url = url;
                tab.frames.clear();
            }
            None => {
                self.tabs.push(Tab {
                    url,
                    frames: Vec::new(),
                });
                self.current = self.tabs.len() - 1;
            }
        }
        Ok(())
    }

    async fn find_elements(&mut self, selector: &str) -> Result<Vec<ElementHandle>, BrowserError> {
        let (_, html) = self.document()?;
        Ok(Self::query(html, selector)?
            .into_iter()
            .enumerate()
            .map(|(index, (text, attributes))| ElementHandle {
                selector: selector.to_string(),
                index,
                text,
                attributes,
            })
            .collect())
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<(), BrowserError> {
        let (doc_url, html) = self.document()?;
        let Some(attributes) = Self::click_target(html, element)? else {
            return Ok(());
        };
        let Some(target) = attributes.get("href").or_else(|| attributes.get("data-nav")) else {
            return Ok(());
        };
        let base = Url::parse(&doc_url).map_err(|e| BrowserError::Protocol(e.to_string()))?;
        let next = base
            .join(target)
            .map_err(|e| BrowserError::Protocol(e.to_string()))?
            .to_string();
        let next = self.load(&next)?;

        let current = self.current;
        match attributes.get("target").map(String::as_str) {
            Some("_blank") => self.tabs.push(Tab {
                url: next,
                frames: Vec::new(),
            }),
            Some("_top") => {
                let tab = &mut self.tabs[current];
                tab.url = next;
                tab.frames.clear();
            }
            _ => {
                let tab = &mut self.tabs[current];
                match tab.frames.last_mut() {
                    Some(frame) => *frame = next,
                    None => tab.url = next,
                }
            }
        }
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        Ok(self.document()?.1.to_string())
    }

    async fn switch_to_frame(&mut self, selector: &str) -> Result<(), BrowserError> {
        let (doc_url, html) = self.document()?;
        let src = Self::query(html, selector)?
            .into_iter()
            .find_map(|(_, attrs)| attrs.get("src").cloned())
            .ok_or_else(|| BrowserError::FrameNotFound(selector.to_string()))?;
        let frame_url = Url::parse(&doc_url)
            .and_then(|base| base.join(&src))
            .map_err(|e| BrowserError::Protocol(e.to_string()))?
            .to_string();
        let frame_url = self.load(&frame_url)?;
        let current = self.current;
        self.tabs[current].frames.push(frame_url);
        Ok(())
    }

    async fn switch_to_default(&mut self) -> Result<(), BrowserError> {
        let current = self.current;
        if let Some(tab) = self.tabs.get_mut(current) {
            tab.frames.clear();
        }
        Ok(())
    }

    async fn switch_to_tab(&mut self, index: usize) -> Result<(), BrowserError> {
        if index >= self.tabs.len() {
            return Err(BrowserError::NoSuchTab {
                index,
                count: self.tabs.len(),
            });
        }
        self.current = index;
        Ok(())
    }

    async fn tab_count(&mut self) -> Result<usize, BrowserError> {
        Ok(self.tabs.len())
    }

    async fn close_tab(&mut self) -> Result<(), BrowserError> {
        self.tab()?;
        self.tabs.remove(self.current);
        self.current = 0;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        Ok(self.tab()?.url.clone())
    }
}
