use super::{ExtractionError, FileKind, TextExtractor};
use image::{GenericImageView, ImageFormat};

/// Describes a PNG image so it can be indexed and cited.
///
/// No OCR is performed: the indexed text records the file name, dimensions and colour type.
pub struct PngExtractor;

impl TextExtractor for PngExtractor {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        let img = image::load_from_memory_with_format(bytes, ImageFormat::Png).map_err(|error| {
            ExtractionError::Failed {
                kind: FileKind::Png,
                reason: format!("image decode failed: {error}"),
            }
        })?;
        let (width, height) = img.dimensions();
        let color = format!("{:?}", img.color()).to_lowercase();

        Ok(format!(
            "Image: {filename} ({width}x{height}, png, {color})"
        ))
    }
}
