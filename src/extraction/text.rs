use super::{ExtractionError, TextExtractor};

/// Reads UTF-8 text files, replacing invalid sequences.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(text.to_string()),
            Err(error) => {
                tracing::warn!(filename, error = %error, "Text file is not valid UTF-8; decoding lossily");
                Ok(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_byte_order_mark() {
        let text = PlainTextExtractor
            .extract("bom.txt", b"\xEF\xBB\xBFhello")
            .unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let text = PlainTextExtractor
            .extract("latin1.txt", b"caf\xE9")
            .unwrap();
        assert!(text.starts_with("caf"));
        assert!(text.contains('\u{FFFD}'));
    }
}
