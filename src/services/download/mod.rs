//! Document download service.
//!
//! Every driver saves through a [`Downloader`], which owns the
//! download-once policy: a destination is claimed in the run's ledger,
//! skipped if a previous run left a non-empty file there, and otherwise
//! written atomically. A record is appended only once the file is on disk.

mod types;

pub use types::{DocumentTarget, SaveOutcome};

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::ScrapeError;
use crate::ledger::Ledger;
use crate::models::{DocumentFormat, DocumentRecord};
use crate::render::{PdfRenderer, RenderError, RenderOptions};
use crate::scrapers::http_client::FetchedResponse;
use crate::scrapers::HttpClient;
use crate::storage::{is_present, write_atomic, Storage};

/// Saves documents for one driver run.
#[derive(Clone)]
pub struct Downloader {
    client: HttpClient,
    storage: Storage,
    ledger: Ledger,
    renderer: Option<Arc<dyn PdfRenderer>>,
    render_options: RenderOptions,
}

impl Downloader {
    pub fn new(client: HttpClient, storage: Storage, ledger: Ledger) -> Self {
        Self {
            client,
            storage,
            ledger,
            renderer: None,
            render_options: RenderOptions::default(),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PdfRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Destination for a target in a given format.
    pub fn path_for(&self, target: &DocumentTarget, format: DocumentFormat) -> PathBuf {
        self.storage
            .document_path(&target.language, format, &target.stem, &target.source_link)
    }

    /// Fetch `url` and save the body as-is.
    ///
    /// When the target carries no format and the URL has no recognizable
    /// extension, a file saved earlier under any format counts as present;
    /// otherwise the body is fetched first and its format sniffed.
    pub async fn save_remote(
        &self,
        target: &DocumentTarget,
        url: &str,
    ) -> Result<SaveOutcome, ScrapeError> {
        let mut known = target.format.or_else(|| DocumentFormat::from_url(url));
        if known.is_none() {
            known = self
                .storage
                .find_existing(&target.language, &target.stem, &target.source_link)
                .await
                .map(|(format, _)| format);
        }

        match known {
            Some(format) => {
                self.persist(target, format, |path| async move {
                    let response = self.client.get(url).await?;
                    self.write_response(url, format, response, &path).await
                })
                .await
            }
            None => {
                let response = self.client.get(url).await?;
                let format = sniff_format(&response);
                debug!("Sniffed {} as {}", url, format);
                self.persist(target, format, |path| async move {
                    self.write_response(url, format, response, &path).await
                })
                .await
            }
        }
    }

    /// Save extracted text as a `.txt` document.
    pub async fn save_text(
        &self,
        target: &DocumentTarget,
        text: &str,
    ) -> Result<SaveOutcome, ScrapeError> {
        if text.trim().is_empty() {
            return Err(ScrapeError::EmptyDocument {
                url: target.source_link.clone(),
            });
        }
        self.persist(target, DocumentFormat::Txt, |path| async move {
            write_atomic(&path, text.as_bytes()).await
        })
        .await
    }

    /// Save bytes already in hand.
    pub async fn save_bytes(
        &self,
        target: &DocumentTarget,
        format: DocumentFormat,
        content: &[u8],
    ) -> Result<SaveOutcome, ScrapeError> {
        if content.is_empty() {
            return Err(ScrapeError::EmptyDocument {
                url: target.source_link.clone(),
            });
        }
        self.persist(target, format, |path| async move {
            write_atomic(&path, content).await
        })
        .await
    }

    /// Render a web page to PDF through the configured renderer.
    pub async fn save_rendered(
        &self,
        target: &DocumentTarget,
        page_url: &str,
    ) -> Result<SaveOutcome, ScrapeError> {
        let renderer = self.renderer.clone().ok_or_else(|| ScrapeError::Render {
            url: page_url.to_string(),
            source: RenderError::NotAvailable("no PDF renderer configured".to_string()),
        })?;

        self.persist(target, DocumentFormat::Pdf, |path| async move {
            self.render_into(renderer.as_ref(), page_url, &path).await
        })
        .await
    }

    async fn render_into(
        &self,
        renderer: &dyn PdfRenderer,
        page_url: &str,
        path: &Path,
    ) -> Result<(), ScrapeError> {
        let write_failed = |source| ScrapeError::WriteFailed {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(write_failed)?;
        }

        let mut partial = path.as_os_str().to_owned();
        partial.push(".part.pdf");
        let partial = PathBuf::from(partial);

        let rendered = renderer
            .render_url_to_pdf(page_url, &partial, &self.render_options)
            .await;
        if let Err(source) = rendered {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(ScrapeError::Render {
                url: page_url.to_string(),
                source,
            });
        }
        if !is_present(&partial).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(ScrapeError::Render {
                url: page_url.to_string(),
                source: RenderError::EmptyOutput,
            });
        }
        tokio::fs::rename(&partial, path)
            .await
            .map_err(write_failed)
    }

    async fn write_response(
        &self,
        url: &str,
        format: DocumentFormat,
        response: FetchedResponse,
        path: &Path,
    ) -> Result<(), ScrapeError> {
        if response.is_empty() {
            return Err(ScrapeError::EmptyDocument {
                url: url.to_string(),
            });
        }
        if format == DocumentFormat::Pdf && !infer::archive::is_pdf(&response.body) {
            warn!(
                "{} was expected to be a PDF but content is {}",
                url,
                infer::get(&response.body)
                    .map(|t| t.mime_type())
                    .or(response.content_type())
                    .unwrap_or("unknown")
            );
        }
        write_atomic(path, &response.body).await
    }

    /// Claim, skip-if-present, write, then record.
    async fn persist<F, Fut>(
        &self,
        target: &DocumentTarget,
        format: DocumentFormat,
        write: F,
    ) -> Result<SaveOutcome, ScrapeError>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<(), ScrapeError>>,
    {
        let path = self.path_for(target, format);

        if !self.ledger.claim(&path) {
            debug!("{} already saved this run", path.display());
            return Ok(SaveOutcome::DuplicateInRun(path));
        }

        if is_present(&path).await {
            debug!("{} already on disk", path.display());
            self.record(target, &path);
            return Ok(SaveOutcome::AlreadyPresent(path));
        }

        if let Err(e) = write(path.clone()).await {
            self.ledger.release(&path);
            return Err(e);
        }
        if !is_present(&path).await {
            self.ledger.release(&path);
            return Err(ScrapeError::EmptyDocument {
                url: target.source_link.clone(),
            });
        }

        info!("Saved {} -> {}", target.title, path.display());
        self.record(target, &path);
        Ok(SaveOutcome::Downloaded(path))
    }

    fn record(&self, target: &DocumentTarget, path: &Path) {
        let mut record = DocumentRecord::new(
            target.title.clone(),
            target.source_link.clone(),
            path.to_path_buf(),
            target.language.clone(),
            target.country.clone(),
        );
        target.extra.apply(&mut record);
        self.ledger.append(record);
    }
}

/// Best-effort format of a fetched body: magic bytes, then Content-Type,
/// then the final URL, else [`DocumentFormat::Bin`].
fn sniff_format(response: &FetchedResponse) -> DocumentFormat {
    infer::get(&response.body)
        .and_then(|kind| DocumentFormat::from_mime(kind.mime_type()))
        .or_else(|| response.content_type().and_then(DocumentFormat::from_mime))
        .or_else(|| DocumentFormat::from_url(&response.final_url))
        .unwrap_or(DocumentFormat::Bin)
}
