use super::{ExtractionError, FileKind, TextExtractor};
use quick_xml::events::Event;
use std::io::{Cursor, Read};

const DOCUMENT_PART: &str = "word/document.xml";
/// Maximum decompressed size read from the document part (zip-bomb guard).
const MAX_DOCUMENT_BYTES: u64 = 50 * 1024 * 1024;

/// Reads the body text of a `.docx` package, one line per paragraph.
pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    fn extract(&self, _filename: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        let xml = read_document_part(bytes)?;
        paragraphs_from_xml(&xml)
    }
}

fn failed(reason: impl ToString) -> ExtractionError {
    ExtractionError::Failed {
        kind: FileKind::Docx,
        reason: reason.to_string(),
    }
}

fn read_document_part(bytes: &[u8]) -> Result<Vec<u8>, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(failed)?;
    let entry = archive
        .by_name(DOCUMENT_PART)
        .map_err(|_| failed(format!("{DOCUMENT_PART} not found")))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_DOCUMENT_BYTES)
        .read_to_end(&mut xml)
        .map_err(failed)?;
    if xml.len() as u64 >= MAX_DOCUMENT_BYTES {
        return Err(failed(format!("{DOCUMENT_PART} exceeds size limit")));
    }
    Ok(xml)
}

fn paragraphs_from_xml(xml: &[u8]) -> Result<String, ExtractionError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut paragraph = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let line = paragraph.trim_end();
                    if !line.is_empty() {
                        out.push_str(line);
                        out.push('\n');
                    }
                    paragraph.clear();
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => paragraph.push('\t'),
                b"br" | b"cr" => paragraph.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(failed)?;
                paragraph.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(error) => return Err(failed(error)),
            _ => {}
        }
        buf.clear();
    }

    if !paragraph.trim().is_empty() {
        out.push_str(paragraph.trim_end());
    }
    Ok(out)
}
