//! HTML-to-PDF rendering through an external renderer.

mod wkhtmltopdf;

pub use wkhtmltopdf::WkhtmltopdfRenderer;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// Renderer failures.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("renderer not available: {0}")]
    NotAvailable(String),
    #[error("renderer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("renderer produced no output")]
    EmptyOutput,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the renderer may load while rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub no_images: bool,
    pub disable_javascript: bool,
    pub disable_local_file_access: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            no_images: true,
            disable_javascript: true,
            disable_local_file_access: true,
        }
    }
}

/// Renders web pages or HTML strings to PDF files.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render_url_to_pdf(
        &self,
        url: &str,
        out: &Path,
        options: &RenderOptions,
    ) -> Result<(), RenderError>;

    async fn render_html_to_pdf(
        &self,
        html: &str,
        out: &Path,
        options: &RenderOptions,
    ) -> Result<(), RenderError>;
}
