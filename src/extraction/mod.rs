//! Text extraction for uploaded documents.
//!
//! Each supported [`FileKind`] maps to a [`TextExtractor`] held by the [`ExtractorRegistry`].
//! Extractors are synchronous; the registry runs them on the blocking pool so large PDFs do not
//! stall the runtime.

mod docx;
mod image;
mod pdf;
mod rtf;
mod text;

pub use docx::DocxExtractor;
pub use image::PngExtractor;
pub use pdf::PdfExtractor;
pub use rtf::RtfExtractor;
pub use text::PlainTextExtractor;

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while turning file bytes into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The file extension is not on the allow-list.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    /// The extractor could not read the file.
    #[error("Failed to extract text from {kind} file: {reason}")]
    Failed {
        /// Kind of file being read.
        kind: FileKind,
        /// Underlying library error.
        reason: String,
    },
    /// Extraction succeeded but produced no text.
    #[error("No text content found in {0} file")]
    Empty(FileKind),
}

/// Document formats accepted by the upload endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Portable Document Format.
    Pdf,
    /// Office Open XML word processing document.
    Docx,
    /// Rich Text Format.
    Rtf,
    /// Plain UTF-8 text.
    Txt,
    /// PNG image.
    Png,
}

impl FileKind {
    /// Every accepted kind, in allow-list order.
    pub const ALL: [FileKind; 5] = [
        FileKind::Pdf,
        FileKind::Docx,
        FileKind::Rtf,
        FileKind::Txt,
        FileKind::Png,
    ];

    /// Detect the kind from a filename's extension, ignoring case.
    pub fn from_filename(filename: &str) -> Result<Self, ExtractionError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "rtf" => Ok(Self::Rtf),
            "txt" => Ok(Self::Txt),
            "png" => Ok(Self::Png),
            "" => Err(ExtractionError::UnsupportedFormat(format!(
                "'{filename}' has no extension"
            ))),
            other => Err(ExtractionError::UnsupportedFormat(format!(".{other}"))),
        }
    }

    /// Lowercase extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Rtf => "rtf",
            Self::Txt => "txt",
            Self::Png => "png",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Capability that converts raw bytes of one format into plain text.
pub trait TextExtractor: Send + Sync {
    /// Extract text from `bytes`; `filename` is only used for descriptive output.
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Dispatch table from [`FileKind`] to its extractor.
#[derive(Clone)]
pub struct ExtractorRegistry {
    extractors: HashMap<FileKind, Arc<dyn TextExtractor>>,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(FileKind::Pdf, Arc::new(PdfExtractor));
        registry.register(FileKind::Docx, Arc::new(DocxExtractor));
        registry.register(FileKind::Rtf, Arc::new(RtfExtractor));
        registry.register(FileKind::Txt, Arc::new(PlainTextExtractor));
        registry.register(FileKind::Png, Arc::new(PngExtractor));
        registry
    }
}

impl ExtractorRegistry {
    /// Registry without any extractor installed.
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Install or replace the extractor for `kind`.
    pub fn register(&mut self, kind: FileKind, extractor: Arc<dyn TextExtractor>) {
        self.extractors.insert(kind, extractor);
    }

    /// Extract text on the blocking pool, rejecting whitespace-only results.
    pub async fn extract(
        &self,
        kind: FileKind,
        filename: &str,
        bytes: Arc<Vec<u8>>,
    ) -> Result<String, ExtractionError> {
        let extractor = self
            .extractors
            .get(&kind)
            .cloned()
            .ok_or_else(|| ExtractionError::UnsupportedFormat(format!(".{kind}")))?;
        let name = filename.to_string();

        let text = tokio::task::spawn_blocking(move || extractor.extract(&name, &bytes))
            .await
            .map_err(|error| ExtractionError::Failed {
                kind,
                reason: format!("extractor task aborted: {error}"),
            })??;

        if text.trim().is_empty() {
            return Err(ExtractionError::Empty(kind));
        }
        tracing::debug!(filename, %kind, chars = text.chars().count(), "Extracted text");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_kinds_case_insensitively() {
        assert_eq!(FileKind::from_filename("Report.PDF").unwrap(), FileKind::Pdf);
        assert_eq!(FileKind::from_filename("notes.Txt").unwrap(), FileKind::Txt);
        assert_eq!(
            FileKind::from_filename("archive.tar.docx").unwrap(),
            FileKind::Docx
        );
        assert_eq!(FileKind::from_filename("scan.png").unwrap(), FileKind::Png);
    }

    #[test]
    fn rejects_unknown_and_missing_extensions() {
        assert!(matches!(
            FileKind::from_filename("slides.pptx"),
            Err(ExtractionError::UnsupportedFormat(ext)) if ext == ".pptx"
        ));
        assert!(matches!(
            FileKind::from_filename("README"),
            Err(ExtractionError::UnsupportedFormat(_))
        ));
    }

    #[tokio::test]
    async fn whitespace_only_text_is_empty() {
        let registry = ExtractorRegistry::default();
        let error = registry
            .extract(FileKind::Txt, "blank.txt", Arc::new(b"  \n\t ".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(error, ExtractionError::Empty(FileKind::Txt)));
    }

    #[tokio::test]
    async fn missing_extractor_is_unsupported() {
        let registry = ExtractorRegistry::empty();
        let error = registry
            .extract(FileKind::Txt, "a.txt", Arc::new(b"hello".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(error, ExtractionError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn default_registry_reads_plain_text() {
        let registry = ExtractorRegistry::default();
        let text = registry
            .extract(FileKind::Txt, "a.txt", Arc::new(b"hello world".to_vec()))
            .await
            .expect("text");
        assert_eq!(text, "hello world");
    }
}
