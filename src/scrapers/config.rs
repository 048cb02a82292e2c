//! Configuration for sites described entirely in the config file.
//!
//! ```toml
//! [drivers.albania]
//! start_url = "https://qbz.gov.al/eli/fletore-zyrtare"
//! country = "Albania"
//! language = "albanian"
//! entry_selector = "a[href]"
//! link_pattern = "/eli/"
//! pdf_selector = "a[title=Download]"
//! pagination = { type = "next_link", selector = "a.next" }
//! ```

use serde::{Deserialize, Serialize};

use super::pagination::Pagination;

/// One `[drivers.<name>]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub start_url: String,
    pub country: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// Anchors on listing pages that lead to documents.
    #[serde(default = "default_entry_selector")]
    pub entry_selector: String,
    /// Regex a document link must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_pattern: Option<String>,
    /// Title on the document page; the listing link text is used otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_selector: Option<String>,
    /// Link to the document's PDF on its page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_selector: Option<String>,
    /// Element holding the document's text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_selector: Option<String>,
    #[serde(default)]
    pub pagination: Pagination,
}

fn default_language() -> String {
    "english".to_string()
}

fn default_entry_selector() -> String {
    "a[href]".to_string()
}
