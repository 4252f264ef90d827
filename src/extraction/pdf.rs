use super::{ExtractionError, FileKind, TextExtractor};

/// Extracts the text layer of a PDF with `pdf-extract`.
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, _filename: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        pdf_extract::extract_text_from_mem(bytes).map_err(|error| ExtractionError::Failed {
            kind: FileKind::Pdf,
            reason: error.to_string(),
        })
    }
}
