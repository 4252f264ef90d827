//! A4 PDF rendering with the standard Helvetica fonts.

use super::{EMPTY_NOTICE, Report, ReportError, format_timestamp};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN_X: f32 = 56.0;
const MARGIN_TOP: f32 = 60.0;
const MARGIN_BOTTOM: f32 = 60.0;
/// Characters per line for 10pt Helvetica within the page margins.
const WRAP_COLUMNS: usize = 92;

const REGULAR: &str = "F1";
const BOLD: &str = "F2";

#[derive(Debug, Clone, PartialEq)]
struct Line {
    text: String,
    font: &'static str,
    size: f32,
}

impl Line {
    fn new(text: impl Into<String>, font: &'static str, size: f32) -> Self {
        Self {
            text: text.into(),
            font,
            size,
        }
    }

    fn blank() -> Self {
        Self::new("", REGULAR, 10.0)
    }

    fn leading(&self) -> f32 {
        self.size * 1.4
    }
}

/// Render the report into PDF bytes.
pub(super) fn render_pdf(report: &Report) -> Result<Vec<u8>, ReportError> {
    let lines = layout(report)?;
    let pages = paginate(lines);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            REGULAR => regular_id,
            BOLD => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in &pages {
        let content = Content {
            operations: page_operations(page),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

fn layout(report: &Report) -> Result<Vec<Line>, ReportError> {
    let mut lines = vec![
        Line::new(pdf_safe(&report.title), BOLD, 18.0),
        Line::new(
            format!("Generated: {}", format_timestamp(report.generated_at)?),
            REGULAR,
            10.0,
        ),
        Line::new(format!("Exchanges: {}", report.exchange_count), REGULAR, 10.0),
        Line::blank(),
    ];

    if report.sections.is_empty() {
        lines.push(Line::new(EMPTY_NOTICE, REGULAR, 10.0));
        return Ok(lines);
    }

    for section in &report.sections {
        lines.push(Line::new(
            format!(
                "Exchange {} - {}",
                section.number,
                format_timestamp(section.timestamp)?
            ),
            BOLD,
            12.0,
        ));
        push_wrapped(&mut lines, &format!("Q: {}", section.question.trim()), BOLD);
        push_wrapped(&mut lines, &format!("A: {}", section.answer.trim()), REGULAR);
        if !section.sources.is_empty() {
            push_wrapped(
                &mut lines,
                &format!("Sources: {}", section.sources.join(", ")),
                REGULAR,
            );
        }
        lines.push(Line::blank());
    }
    Ok(lines)
}

fn push_wrapped(lines: &mut Vec<Line>, text: &str, font: &'static str) {
    for paragraph in pdf_safe(text).lines() {
        if paragraph.trim().is_empty() {
            lines.push(Line::blank());
            continue;
        }
        for wrapped in wrap(paragraph, WRAP_COLUMNS) {
            lines.push(Line::new(wrapped, font, 10.0));
        }
    }
}

/// Greedy word wrap; words longer than `width` are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word.to_string();
        while word.chars().count() > width {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            let split_at = word
                .char_indices()
                .nth(width)
                .map(|(index, _)| index)
                .unwrap_or(word.len());
            let rest = word.split_off(split_at);
            out.push(word);
            word = rest;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Standard Type1 fonts only cover ASCII reliably; everything else becomes `?`. Carriage
/// returns are dropped so CRLF text splits into clean lines.
fn pdf_safe(text: &str) -> String {
    text.chars()
        .filter(|&c| c != '\r')
        .map(|c| match c {
            '\n' => '\n',
            '\t' => ' ',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '?',
        })
        .collect()
}

fn paginate(lines: Vec<Line>) -> Vec<Vec<Line>> {
    let usable = PAGE_HEIGHT as f32 - MARGIN_TOP - MARGIN_BOTTOM;
    let mut pages = Vec::new();
    let mut current = Vec::new();
    let mut used = 0.0;

    for line in lines {
        let leading = line.leading();
        if used + leading > usable && !current.is_empty() {
            pages.push(std::mem::take(&mut current));
            used = 0.0;
        }
        used += leading;
        current.push(line);
    }
    if !current.is_empty() || pages.is_empty() {
        pages.push(current);
    }
    pages
}

fn page_operations(lines: &[Line]) -> Vec<Operation> {
    let mut operations = vec![Operation::new("BT", vec![])];
    let mut y = PAGE_HEIGHT as f32 - MARGIN_TOP;

    for line in lines {
        y -= line.leading();
        if line.text.is_empty() {
            continue;
        }
        operations.push(Operation::new("Tf", vec![line.font.into(), line.size.into()]));
        operations.push(Operation::new(
            "Tm",
            vec![
                1.into(),
                0.into(),
                0.into(),
                1.into(),
                MARGIN_X.into(),
                y.into(),
            ],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(line.text.as_str())],
        ));
    }

    operations.push(Operation::new("ET", vec![]));
    operations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{compile, tests::exchanges};
    use time::OffsetDateTime;

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack
            .windows(needle.len())
            .any(|window| window == needle.as_bytes())
    }

    #[test]
    fn renders_loadable_pdf_with_sections() {
        let report = compile(&exchanges(3), OffsetDateTime::UNIX_EPOCH);
        let bytes = render_pdf(&report).unwrap();

        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert!(contains(&bytes, "(Exchanges: 3)"));
        assert!(contains(&bytes, "(Exchange 1 - 1970-01-01T00:00:00Z)"));
        assert!(contains(&bytes, "(Q: Question 3?)"));
    }

    #[test]
    fn empty_report_is_a_single_page() {
        let report = compile(&[], OffsetDateTime::UNIX_EPOCH);
        let bytes = render_pdf(&report).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert!(contains(&bytes, "(No exchanges recorded.)"));
    }

    #[test]
    fn long_conversations_paginate() {
        let report = compile(&exchanges(40), OffsetDateTime::UNIX_EPOCH);
        let bytes = render_pdf(&report).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() > 1);
    }

    #[test]
    fn wrap_respects_width_and_splits_long_words() {
        let lines = wrap("alpha beta gamma delta", 11);
        assert_eq!(lines, vec!["alpha beta", "gamma delta"]);

        let lines = wrap("abcdefghij", 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn non_ascii_is_replaced() {
        assert_eq!(pdf_safe("café – ok"), "caf? ? ok");
    }

    #[test]
    fn crlf_answers_render_without_stray_marks() {
        assert_eq!(pdf_safe("first\r\nsecond\r\n"), "first\nsecond\n");

        let mut lines = Vec::new();
        push_wrapped(&mut lines, "A: line one\r\nline two", REGULAR);
        let texts: Vec<_> = lines.iter().map(|line| line.text.as_str()).collect();
        assert_eq!(texts, vec!["A: line one", "line two"]);
    }
}
