//! Filename sanitizing and the on-disk document layout.
//!
//! Documents land at `{root}/{language}/{format}/{stem}-{hash}.{ext}` where
//! `stem` is the sanitized title (optionally with a content excerpt) and
//! `hash` is the first 8 hex chars of the SHA-256 of the source link. The
//! hash keeps identically titled documents apart while staying stable across
//! runs, which the download-once existence check depends on.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::ScrapeError;
use crate::models::DocumentFormat;

/// Upper bound on a sanitized stem, in bytes.
pub const MAX_STEM_BYTES: usize = 200;

/// Bytes of a sanitized content excerpt kept in a stem.
pub const EXCERPT_BYTES: usize = 50;

const LINK_HASH_LEN: usize = 8;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W+").unwrap());

/// Map free text to a filesystem-safe, lower-case, bounded name component.
///
/// Runs of non-word characters become a single `-`. The result never holds
/// whitespace or path separators and never exceeds [`MAX_STEM_BYTES`].
pub fn sanitize(text: &str) -> String {
    sanitize_bounded(text, MAX_STEM_BYTES)
}

fn sanitize_bounded(text: &str, max_bytes: usize) -> String {
    let collapsed = NON_WORD.replace_all(text, "-").to_lowercase();
    let trimmed = truncate_at_char_boundary(collapsed.trim_matches('-'), max_bytes);
    let trimmed = trimmed.trim_end_matches('-');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// First 8 hex chars of the SHA-256 of a source link.
pub fn link_hash(source_link: &str) -> String {
    let digest = Sha256::digest(source_link.as_bytes());
    hex::encode(digest)[..LINK_HASH_LEN].to_string()
}

/// Builder for the title-derived part of a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStem {
    title: String,
    excerpt: Option<String>,
    suffix: Option<String>,
}

impl FileStem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            excerpt: None,
            suffix: None,
        }
    }

    /// Disambiguate with a slice of the document body.
    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        let excerpt = excerpt.into();
        if !excerpt.trim().is_empty() {
            self.excerpt = Some(excerpt);
        }
        self
    }

    /// Append a raw suffix such as `__2` for the second attachment of a page.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Render the stem; always within [`MAX_STEM_BYTES`].
    pub fn render(&self) -> String {
        let excerpt = self
            .excerpt
            .as_deref()
            .map(|e| sanitize_bounded(e, EXCERPT_BYTES));
        let suffix = self
            .suffix
            .as_deref()
            .map(|s| sanitize_bounded(s, EXCERPT_BYTES));

        let reserved = excerpt.as_ref().map(|e| e.len() + 1).unwrap_or(0)
            + suffix.as_ref().map(|s| s.len()).unwrap_or(0);
        let mut stem = sanitize_bounded(&self.title, MAX_STEM_BYTES - reserved);
        if let Some(excerpt) = excerpt {
            stem.push('-');
            stem.push_str(&excerpt);
        }
        if let Some(suffix) = suffix {
            stem.push_str(&suffix);
        }
        stem
    }
}

/// Root of one driver's download tree.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination for a document: `{root}/{language}/{format}/{stem}-{hash}.{ext}`.
    pub fn document_path(
        &self,
        language: &str,
        format: DocumentFormat,
        stem: &FileStem,
        source_link: &str,
    ) -> PathBuf {
        let filename = format!(
            "{}-{}.{}",
            stem.render(),
            link_hash(source_link),
            format.extension()
        );
        self.root
            .join(sanitize(language))
            .join(format.dir_name())
            .join(filename)
    }

    /// A usable file saved earlier for this document, whatever its format.
    pub async fn find_existing(
        &self,
        language: &str,
        stem: &FileStem,
        source_link: &str,
    ) -> Option<(DocumentFormat, PathBuf)> {
        for format in DocumentFormat::ALL {
            let path = self.document_path(language, format, stem, source_link);
            if is_present(&path).await {
                return Some((format, path));
            }
        }
        None
    }
}

/// Whether a previous run already left a usable file at `path`.
///
/// Zero-length files do not count; they can only come from an interrupted
/// write outside of [`write_atomic`].
pub async fn is_present(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Write `content` to a `.part` sibling and rename it into place.
pub async fn write_atomic(path: &Path, content: &[u8]) -> Result<(), ScrapeError> {
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
    partial.push(".part");
    let partial = PathBuf::from(partial);

    if let Err(e) = tokio::fs::write(&partial, content).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(write_failed(e));
    }
    if let Err(e) = tokio::fs::rename(&partial, path).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(write_failed(e));
    }
    Ok(())
}
