//! Remote browser automation for click-driven sites.
//!
//! Drivers talk to a [`BrowserSession`]; the chromiumoxide-backed
//! [`ChromeSession`] drives a real Chrome over CDP, and [`ReplaySession`]
//! serves canned pages for dry runs and tests.

mod chrome;
mod config;
mod replay;

pub use chrome::ChromeSession;
pub use config::BrowserEngineConfig;
pub use replay::ReplaySession;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::error::ScrapeError;

/// Browser session failures other than "selector matched nothing".
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("browser support not compiled; rebuild with --features browser")]
    NotCompiled,
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("failed to connect to remote browser: {0}")]
    Connect(String),
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("element {selector}[{index}] is no longer on the page")]
    StaleElement { selector: String, index: usize },
    #[error("frame not found: {0}")]
    FrameNotFound(String),
    #[error("tab {index} does not exist ({count} open)")]
    NoSuchTab { index: usize, count: usize },
    #[error("browser protocol error: {0}")]
    Protocol(String),
}

/// Snapshot of one matched element.
///
/// Handles are addressed by selector and position, so they survive being
/// passed around but go stale if the page changes underneath them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ElementHandle {
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub index: usize,
    pub text: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl ElementHandle {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }
}

/// Operations drivers need from an automated browser.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Elements matching a CSS selector in the current document.
    async fn find_elements(&mut self, selector: &str) -> Result<Vec<ElementHandle>, BrowserError>;

    async fn click(&mut self, element: &ElementHandle) -> Result<(), BrowserError>;

    /// Serialized HTML of the current document (frame-aware).
    async fn page_source(&mut self) -> Result<String, BrowserError>;

    /// Make the frame matching `selector` the current document.
    async fn switch_to_frame(&mut self, selector: &str) -> Result<(), BrowserError>;

    /// Return to the top-level document of the current tab.
    async fn switch_to_default(&mut self) -> Result<(), BrowserError>;

    async fn switch_to_tab(&mut self, index: usize) -> Result<(), BrowserError>;

    async fn tab_count(&mut self) -> Result<usize, BrowserError>;

    /// Close the current tab and return to the first one.
    async fn close_tab(&mut self) -> Result<(), BrowserError>;

    async fn current_url(&mut self) -> Result<String, BrowserError>;

    async fn close(&mut self) {}
}

/// Find elements, failing with `AutomationElementNotFound` if none match.
pub async fn find_required(
    session: &mut dyn BrowserSession,
    selector: &str,
) -> Result<Vec<ElementHandle>, ScrapeError> {
    let found = session.find_elements(selector).await?;
    if found.is_empty() {
        let url = session.current_url().await.unwrap_or_default();
        return Err(ScrapeError::element(url, selector));
    }
    Ok(found)
}

/// First element matching `selector` whose text equals `text` (case-insensitive).
pub async fn find_by_text(
    session: &mut dyn BrowserSession,
    selector: &str,
    text: &str,
) -> Result<ElementHandle, ScrapeError> {
    let wanted = text.trim().to_lowercase();
    let found = session.find_elements(selector).await?;
    match found
        .into_iter()
        .find(|el| el.text.trim().to_lowercase() == wanted)
    {
        Some(el) => Ok(el),
        None => {
            let url = session.current_url().await.unwrap_or_default();
            Err(ScrapeError::element(url, format!("{selector} with text {text:?}")))
        }
    }
}

/// Switch to the most recently opened tab.
pub async fn switch_to_last_tab(session: &mut dyn BrowserSession) -> Result<(), BrowserError> {
    let count = session.tab_count().await?;
    session.switch_to_tab(count.saturating_sub(1)).await
}

/// Click `element` and switch to the tab it opened.
pub async fn open_in_new_tab(
    session: &mut dyn BrowserSession,
    element: &ElementHandle,
) -> Result<(), ScrapeError> {
    let before = session.tab_count().await?;
    session.click(element).await?;
    if session.tab_count().await? <= before {
        let url = session.current_url().await.unwrap_or_default();
        return Err(ScrapeError::element(
            url,
            format!("{}[{}] opening a tab", element.selector, element.index),
        ));
    }
    switch_to_last_tab(session).await?;
    Ok(())
}

/// Close every tab but the first and switch back to it.
pub async fn close_extra_tabs(session: &mut dyn BrowserSession) -> Result<(), BrowserError> {
    while session.tab_count().await? > 1 {
        switch_to_last_tab(session).await?;
        session.close_tab().await?;
    }
    session.switch_to_tab(0).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_class() {
        let handle = ElementHandle {
            selector: "a".into(),
            index: 0,
            text: "Next".into(),
            attributes: HashMap::from([("class".to_string(), "Linkbutton big".to_string())]),
        };
        assert!(handle.has_class("Linkbutton"));
        assert!(!handle.has_class("Link"));
    }

    #[tokio::test]
    async fn test_find_required_reports_selector() {
        let mut session = ReplaySession::new();
        session.add_page("https://gzk.example/", "<html><body><a href='/x'>x</a></body></html>");
        session.navigate("https://gzk.example/").await.unwrap();

        let err = find_required(&mut session, "#MainContent_txtDocument")
            .await
            .unwrap_err();
        match err {
            ScrapeError::AutomationElementNotFound { url, selector } => {
                assert_eq!(url, "https://gzk.example/");
                assert_eq!(selector, "#MainContent_txtDocument");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_open_in_new_tab_requires_a_tab() {
        let mut session = ReplaySession::new();
        session.add_page(
            "https://site.example/",
            r#"<a href="/doc" target="_blank">doc</a><a href="/same">same</a>"#,
        );
        session.add_page("https://site.example/doc", "<p>doc</p>");
        session.add_page("https://site.example/same", "<p>same</p>");
        session.navigate("https://site.example/").await.unwrap();

        let links = session.find_elements("a").await.unwrap();
        open_in_new_tab(&mut session, &links[0]).await.unwrap();
        assert_eq!(session.current_url().await.unwrap(), "https://site.example/doc");
        close_extra_tabs(&mut session).await.unwrap();
        assert_eq!(session.tab_count().await.unwrap(), 1);

        let err = open_in_new_tab(&mut session, &links[1]).await.unwrap_err();
        assert_eq!(err.kind(), "automation_element_not_found");
    }

    #[tokio::test]
    async fn test_find_by_text_ignores_case() {
        let mut session = ReplaySession::new();
        session.add_page(
            "https://normattiva.example/code",
            "<a href='/a'>Atto Completo</a><a href='/b'>altro</a>",
        );
        session.navigate("https://normattiva.example/code").await.unwrap();
        let el = find_by_text(&mut session, "a", "atto completo").await.unwrap();
        assert_eq!(el.attr("href"), Some("/a"));
    }
}
