//! Per-run state handed to every driver.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::ScrapeError;
use crate::ledger::{Ledger, LedgerError};
use crate::services::{Downloader, SaveOutcome};

use super::site::Processed;
use super::HttpClient;

/// Knobs for one driver run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Only the first section, listing page and document.
    pub test_run: bool,
    /// Documents processed concurrently; 1 keeps discovery order.
    pub workers: usize,
    /// Serialize the ledger after every listing section.
    pub checkpoint: bool,
    pub metadata_path: PathBuf,
}

impl RunSettings {
    pub fn new(metadata_path: impl Into<PathBuf>) -> Self {
        Self {
            test_run: false,
            workers: 1,
            checkpoint: false,
            metadata_path: metadata_path.into(),
        }
    }
}

/// Events emitted while a driver runs, for progress display.
#[derive(Debug, Clone)]
pub enum RunEvent {
    SectionStarted {
        label: String,
    },
    PageVisited {
        url: String,
        entries: usize,
    },
    Saved {
        title: String,
        path: PathBuf,
        new_document: bool,
    },
    Skipped {
        url: String,
        kind: &'static str,
        message: String,
    },
}

/// Everything a driver needs: where to save, how to fetch, what to report.
#[derive(Clone)]
pub struct RunContext {
    downloader: Downloader,
    settings: RunSettings,
    events: Option<mpsc::Sender<RunEvent>>,
}

impl RunContext {
    pub fn new(downloader: Downloader, settings: RunSettings) -> Self {
        Self {
            downloader,
            settings,
            events: None,
        }
    }

    pub fn with_events(mut self, events: mpsc::Sender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn client(&self) -> &HttpClient {
        self.downloader.client()
    }

    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    pub fn ledger(&self) -> &Ledger {
        self.downloader.ledger()
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn test_run(&self) -> bool {
        self.settings.test_run
    }

    pub async fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }

    /// Intermediate ledger write; failures are logged and the run goes on.
    pub async fn checkpoint(&self) {
        if !self.settings.checkpoint {
            return;
        }
        if let Err(e) = self.ledger().checkpoint(&self.settings.metadata_path).await {
            warn!("Checkpoint failed: {}", e);
        }
    }

    /// Write the complete ledger to the metadata path.
    pub async fn finalize(&self) -> Result<(), ScrapeError> {
        let path = &self.settings.metadata_path;
        self.ledger().serialize(path).await.map_err(|e| match e {
            LedgerError::Write(e) => e,
            other => ScrapeError::WriteFailed {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, other.to_string()),
            },
        })
    }
}

/// A document or page that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skip {
    pub url: String,
    pub title: Option<String>,
    pub kind: &'static str,
    pub message: String,
}

/// Counts and skips for one driver run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub driver: String,
    pub pages_visited: usize,
    pub discovered: usize,
    pub downloaded: usize,
    pub already_present: usize,
    pub duplicates: usize,
    pub skipped: Vec<Skip>,
    /// Set when a navigation failure ended the run early.
    pub aborted: Option<String>,
}

impl RunSummary {
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            ..Default::default()
        }
    }

    /// Documents recorded in the ledger this run.
    pub fn recorded(&self) -> usize {
        self.downloaded + self.already_present
    }

    pub async fn saved(&mut self, ctx: &RunContext, title: &str, outcome: &SaveOutcome) {
        match outcome {
            SaveOutcome::Downloaded(_) => self.downloaded += 1,
            SaveOutcome::AlreadyPresent(_) => self.already_present += 1,
            SaveOutcome::DuplicateInRun(path) => {
                debug!("Duplicate in run: {}", path.display());
                self.duplicates += 1;
                return;
            }
        }
        ctx.emit(RunEvent::Saved {
            title: title.to_string(),
            path: outcome.path().to_path_buf(),
            new_document: outcome.is_new(),
        })
        .await;
    }

    /// Count the files saved for one document and collect the ones that failed.
    pub async fn absorb(&mut self, ctx: &RunContext, url: &str, processed: Processed) {
        for outcome in &processed.saved {
            self.saved(ctx, &processed.title, outcome).await;
        }
        for e in &processed.failed {
            self.skip(ctx, url, Some(processed.title.as_str()), e).await;
        }
    }

    /// Log and collect a skipped document or page.
    pub async fn skip(
        &mut self,
        ctx: &RunContext,
        url: &str,
        title: Option<&str>,
        error: &ScrapeError,
    ) {
        let url = error.url().unwrap_or(url).to_string();
        match title {
            Some(title) => warn!(kind = error.kind(), "Skipping {} ({}): {}", title, url, error),
            None => warn!(kind = error.kind(), "Skipping {}: {}", url, error),
        }
        ctx.emit(RunEvent::Skipped {
            url: url.clone(),
            kind: error.kind(),
            message: error.to_string(),
        })
        .await;
        self.skipped.push(Skip {
            url,
            title: title.map(str::to_string),
            kind: error.kind(),
            message: error.to_string(),
        });
    }
}
