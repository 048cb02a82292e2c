//! wkhtmltopdf renderer.
//!
//! Runs the system `wkhtmltopdf` binary. Pages whose subresources fail to
//! load make it exit non-zero while still writing a usable PDF; that case is
//! accepted with a warning.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{PdfRenderer, RenderError, RenderOptions};

/// Renderer backed by the `wkhtmltopdf` executable.
#[derive(Debug, Clone)]
pub struct WkhtmltopdfRenderer {
    binary: PathBuf,
}

impl WkhtmltopdfRenderer {
    /// Use an explicit binary path, or find `wkhtmltopdf` on PATH.
    pub fn new(binary: Option<PathBuf>) -> Result<Self, RenderError> {
        let binary = match binary {
            Some(path) => path,
            None => which::which("wkhtmltopdf").map_err(|_| {
                RenderError::NotAvailable(
                    "wkhtmltopdf not found (install wkhtmltopdf or set WKHTMLTOPDF_PATH)"
                        .to_string(),
                )
            })?,
        };
        Ok(Self { binary })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn option_args(options: &RenderOptions) -> Vec<&'static str> {
        let mut args = vec!["--quiet", "--encoding", "utf-8"];
        if options.no_images {
            args.push("--no-images");
        }
        if options.disable_javascript {
            args.push("--disable-javascript");
        }
        if options.disable_local_file_access {
            args.push("--disable-local-file-access");
        }
        args
    }

    async fn run(
        &self,
        input: &str,
        stdin_html: Option<&str>,
        out: &Path,
        options: &RenderOptions,
    ) -> Result<(), RenderError> {
        let mut command = Command::new(&self.binary);
        command
            .args(Self::option_args(options))
            .arg(input)
            .arg(out)
            .stdin(if stdin_html.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        debug!("Running {} for {}", self.binary.display(), input);
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RenderError::NotAvailable(format!(
                    "{} not found",
                    self.binary.display()
                )));
            }
            Err(e) => return Err(RenderError::Io(e)),
        };

        if let (Some(html), Some(mut stdin)) = (stdin_html, child.stdin.take()) {
            stdin.write_all(html.as_bytes()).await?;
            drop(stdin);
        }

        let output = child.wait_with_output().await?;
        let produced = tokio::fs::metadata(out)
            .await
            .map(|m| m.len() > 0)
            .unwrap_or(false);

        if output.status.success() {
            return if produced {
                Ok(())
            } else {
                Err(RenderError::EmptyOutput)
            };
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if produced {
            warn!(
                "wkhtmltopdf exited with {} for {} but wrote a PDF: {}",
                output.status, input, stderr
            );
            return Ok(());
        }
        Err(RenderError::Failed {
            status: output.status.to_string(),
            stderr,
        })
    }
}

#[async_trait]
impl PdfRenderer for WkhtmltopdfRenderer {
    async fn render_url_to_pdf(
        &self,
        url: &str,
        out: &Path,
        options: &RenderOptions,
    ) -> Result<(), RenderError> {
        self.run(url, None, out, options).await
    }

    async fn render_html_to_pdf(
        &self,
        html: &str,
        out: &Path,
        options: &RenderOptions,
    ) -> Result<(), RenderError> {
        // "-" reads the page from stdin
        self.run("-", Some(html), out, options).await
    }
}
