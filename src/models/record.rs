//! Ledger entry for one saved document.

use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Version of the metadata file layout written by this crate.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Metadata for one document persisted to disk.
///
/// Only ever appended to a ledger after the corresponding file write
/// succeeded (or the file was already present from an earlier run).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Title as extracted from the source page. Not unique.
    pub title: String,
    /// Page or file URL the content was fetched from.
    #[serde(alias = "link")]
    pub source_link: String,
    pub download_path: PathBuf,
    /// Wall-clock date of the run, serialized as `YYYY-MM-DD`.
    pub download_date: NaiveDate,
    pub language: String,
    pub country: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_enacted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_effective: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub president: Option<String>,
}

impl DocumentRecord {
    /// Create a record dated today with no optional fields.
    pub fn new(
        title: impl Into<String>,
        source_link: impl Into<String>,
        download_path: PathBuf,
        language: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            title: title.into(),
            source_link: source_link.into(),
            download_path,
            download_date: Local::now().date_naive(),
            language: language.into(),
            country: country.into(),
            date_enacted: None,
            date_effective: None,
            last_updated: None,
            document_type: None,
            status: None,
            description: None,
            category: None,
            president: None,
        }
    }
}

/// Optional per-driver fields carried from discovery to the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraFields {
    pub date_enacted: Option<String>,
    pub date_effective: Option<String>,
    pub last_updated: Option<String>,
    pub document_type: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub president: Option<String>,
}

impl ExtraFields {
    /// Copy every set field onto a record.
    pub fn apply(&self, record: &mut DocumentRecord) {
        record.date_enacted = self.date_enacted.clone();
        record.date_effective = self.date_effective.clone();
        record.last_updated = self.last_updated.clone();
        record.document_type = self.document_type.clone();
        record.status = self.status.clone();
        record.description = self.description.clone();
        record.category = self.category.clone();
        record.president = self.president.clone();
    }

    /// Fill unset fields from `other`.
    pub fn merge(mut self, other: &ExtraFields) -> Self {
        macro_rules! fill {
            ($($field:ident),*) => {
                $(if self.$field.is_none() {
                    self.$field = other.$field.clone();
                })*
            };
        }
        fill!(
            date_enacted,
            date_effective,
            last_updated,
            document_type,
            status,
            description,
            category,
            president
        );
        self
    }
}
