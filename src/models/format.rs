//! On-disk document formats.

use serde::{Deserialize, Serialize};

/// Format of a saved document; also names the layout directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Txt,
    Html,
    Doc,
    Docx,
    Rtf,
    Zip,
    /// Unrecognized binary content.
    Bin,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 8] = [
        Self::Pdf,
        Self::Txt,
        Self::Html,
        Self::Doc,
        Self::Docx,
        Self::Rtf,
        Self::Zip,
        Self::Bin,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Txt => "txt",
            Self::Html => "html",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Rtf => "rtf",
            Self::Zip => "zip",
            Self::Bin => "bin",
        }
    }

    /// Directory name used in `{root}/{language}/{format}/`.
    pub fn dir_name(&self) -> &'static str {
        self.extension()
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" => Some(Self::Txt),
            "html" | "htm" => Some(Self::Html),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            "rtf" => Some(Self::Rtf),
            "zip" => Some(Self::Zip),
            _ => None,
        }
    }

    /// Map a MIME type to a format.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or(mime).trim();
        match essence {
            "application/pdf" => Some(Self::Pdf),
            "text/plain" => Some(Self::Txt),
            "text/html" | "application/xhtml+xml" => Some(Self::Html),
            "application/msword" => Some(Self::Doc),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "application/rtf" | "text/rtf" => Some(Self::Rtf),
            "application/zip" => Some(Self::Zip),
            _ => None,
        }
    }

    /// Guess the format from the last path segment of a URL.
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url::Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| url.to_string());
        let (_, ext) = path.rsplit_once('.')?;
        Self::from_extension(ext)
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_mime_ignores_parameters() {
        assert_eq!(
            DocumentFormat::from_mime("application/pdf; charset=binary"),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(DocumentFormat::from_mime("image/png"), None);
    }

    #[test]
    fn test_from_url() {
        assert_eq!(
            DocumentFormat::from_url("https://vbpl.vn/FileData/TW/Lists/law.DOC?x=1"),
            Some(DocumentFormat::Doc)
        );
        assert_eq!(
            DocumentFormat::from_url("https://example.org/law_docs/1234eng.pdf"),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(DocumentFormat::from_url("https://example.org/laws/"), None);
    }
}
