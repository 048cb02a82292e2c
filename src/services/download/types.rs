//! Download service types.

use std::path::{Path, PathBuf};

use crate::models::{DocumentFormat, ExtraFields};
use crate::storage::FileStem;

/// A document a driver wants saved.
#[derive(Debug, Clone)]
pub struct DocumentTarget {
    pub title: String,
    /// URL recorded in the ledger and hashed into the file name.
    pub source_link: String,
    pub language: String,
    pub country: String,
    /// `None` lets the downloader infer it from the URL or the content.
    pub format: Option<DocumentFormat>,
    pub stem: FileStem,
    pub extra: ExtraFields,
}

impl DocumentTarget {
    pub fn new(
        title: impl Into<String>,
        source_link: impl Into<String>,
        language: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        let title = title.into();
        Self {
            stem: FileStem::new(title.clone()),
            title,
            source_link: source_link.into(),
            language: language.into(),
            country: country.into(),
            format: None,
            extra: ExtraFields::default(),
        }
    }

    pub fn format(mut self, format: DocumentFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn stem(mut self, stem: FileStem) -> Self {
        self.stem = stem;
        self
    }

    pub fn extra(mut self, extra: ExtraFields) -> Self {
        self.extra = extra;
        self
    }
}

/// What happened to one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Fetched and written this run.
    Downloaded(PathBuf),
    /// File left by an earlier run; recorded without fetching.
    AlreadyPresent(PathBuf),
    /// Another entry already claimed this path during this run; not recorded again.
    DuplicateInRun(PathBuf),
}

impl SaveOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Downloaded(p) | Self::AlreadyPresent(p) | Self::DuplicateInRun(p) => p,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Downloaded(_))
    }
}
