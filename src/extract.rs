//! Thin text-extraction seam in front of the chunker.
//!
//! Heavy format-specific extraction (PDF parsing, OCR) lives outside this
//! crate; what ships here is source-kind detection, the plain formats that
//! need no external tooling, and a remote-fetch helper for URL ingestion.

use std::path::Path;

use scraper::{Html, Selector};
use url::Url;

use crate::types::RagError;

/// Source formats the built-in extractor understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    PlainText,
    Markdown,
    Html,
    Csv,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::PlainText => "text",
            SourceKind::Markdown => "markdown",
            SourceKind::Html => "html",
            SourceKind::Csv => "csv",
        }
    }
}

/// Detects the source kind from a file name's extension.
pub fn source_kind(name: &str) -> Option<SourceKind> {
    let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "txt" | "text" | "log" => Some(SourceKind::PlainText),
        "md" | "markdown" => Some(SourceKind::Markdown),
        "html" | "htm" => Some(SourceKind::Html),
        "csv" => Some(SourceKind::Csv),
        _ => None,
    }
}

/// Extracts raw text from local files of the supported kinds.
#[derive(Clone, Copy, Debug, Default)]
pub struct DocumentExtractor;

impl DocumentExtractor {
    /// Reads and extracts text from `path`.
    ///
    /// Unrecognized extensions surface [`RagError::UnsupportedSource`], which
    /// ingestion reports as a soft error rather than a crash.
    pub fn extract(&self, path: &Path) -> Result<String, RagError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let kind = source_kind(name).ok_or_else(|| {
            RagError::UnsupportedSource(
                Path::new(name)
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("<none>")
                    .to_string(),
            )
        })?;

        let raw = std::fs::read_to_string(path)?;
        Ok(match kind {
            SourceKind::Html => html_to_text(&raw),
            SourceKind::PlainText | SourceKind::Markdown | SourceKind::Csv => raw,
        })
    }
}

/// Strips markup from an HTML document, keeping visible text blocks.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let body_selector = Selector::parse("body").expect("static selector");

    let root = document
        .select(&body_selector)
        .next()
        .map(|body| *body)
        .unwrap_or_else(|| *document.root_element());

    let mut blocks: Vec<String> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let parent_tag = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|el| el.name()));
        if matches!(parent_tag, Some("script") | Some("style")) {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            blocks.push(trimmed.to_string());
        }
    }
    blocks.join("\n\n")
}

/// Downloads a remote document and extracts its text.
///
/// HTML responses are stripped to visible text; everything else is returned
/// as-is and left to the chunker's normalization.
pub async fn fetch_remote(client: &reqwest::Client, url: &Url) -> Result<String, RagError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|err| RagError::Fetch(err.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(RagError::Fetch(format!("{url} returned {status}")));
    }

    let is_html = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains("text/html"))
        .unwrap_or(false);
    let body = response
        .text()
        .await
        .map_err(|err| RagError::Fetch(err.to_string()))?;

    Ok(if is_html { html_to_text(&body) } else { body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_detected_by_extension() {
        assert_eq!(source_kind("notes.txt"), Some(SourceKind::PlainText));
        assert_eq!(source_kind("README.MD"), Some(SourceKind::Markdown));
        assert_eq!(source_kind("page.html"), Some(SourceKind::Html));
        assert_eq!(source_kind("table.csv"), Some(SourceKind::Csv));
        assert_eq!(source_kind("scan.pdf"), None);
        assert_eq!(source_kind("no_extension"), None);
    }

    #[test]
    fn unsupported_extension_is_a_soft_error() {
        let extractor = DocumentExtractor;
        let err = extractor.extract(Path::new("image.jpg")).unwrap_err();
        assert!(matches!(err, RagError::UnsupportedSource(ext) if ext == "jpg"));
    }

    #[test]
    fn html_markup_is_stripped() {
        let html = r#"<html><head><style>p { color: red; }</style></head>
            <body><h1>Title</h1><p>First paragraph.</p>
            <script>console.log("ignored");</script>
            <p>Second <b>paragraph</b>.</p></body></html>"#;
        let text = html_to_text(html);
        assert!(text.contains("Title"));
        assert!(text.contains("First paragraph."));
        assert!(text.contains("paragraph"));
        assert!(!text.contains("console.log"));
        assert!(!text.contains("color: red"));
    }

    #[test]
    fn plain_files_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "plain contents").unwrap();
        let text = DocumentExtractor.extract(&path).unwrap();
        assert_eq!(text, "plain contents");
    }
}
