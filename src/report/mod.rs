//! Conversation report compilation and rendering.
//!
//! [`compile`] turns a conversation snapshot into a [`Report`]; [`render`] writes it as a PDF
//! or as plain text. Both steps are pure: the same snapshot and generation time always produce
//! the same bytes.

mod pdf;
mod text;

use crate::conversation::{Exchange, SourceCitation};
use serde::Serialize;
use std::str::FromStr;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Errors raised while rendering a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// PDF object serialization failed.
    #[error("Failed to build PDF: {0}")]
    Pdf(#[from] lopdf::Error),
    /// Writing the rendered document failed.
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),
    /// A timestamp could not be formatted.
    #[error("Failed to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// Output format of a rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// A4 PDF document.
    #[default]
    Pdf,
    /// UTF-8 plain text.
    Text,
}

impl ReportFormat {
    /// MIME type of the rendered bytes.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Text => "text/plain; charset=utf-8",
        }
    }

    /// Download name offered to clients.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Pdf => "rag_conversation_report.pdf",
            Self::Text => "rag_conversation_report.txt",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "text" | "txt" | "plain" => Ok(Self::Text),
            _ => Err(()),
        }
    }
}

/// Compiled report: a header plus one section per exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Document title.
    pub title: String,
    /// Time the report was generated.
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    /// Number of exchanges in the report.
    pub exchange_count: usize,
    /// One section per exchange, in conversation order.
    pub sections: Vec<ReportSection>,
}

/// One question and answer within a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSection {
    /// One-based position in the conversation.
    pub number: usize,
    /// Question text.
    pub question: String,
    /// Answer text.
    pub answer: String,
    /// Time the exchange was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Cited sources rendered as `filename (chunk n)`.
    pub sources: Vec<String>,
}

const REPORT_TITLE: &str = "RAG Conversation Report";
const EMPTY_NOTICE: &str = "No exchanges recorded.";

/// Compile a conversation snapshot into a report.
pub fn compile(exchanges: &[Exchange], generated_at: OffsetDateTime) -> Report {
    let sections = exchanges
        .iter()
        .enumerate()
        .map(|(position, exchange)| ReportSection {
            number: position + 1,
            question: exchange.question.clone(),
            answer: exchange.answer.clone(),
            timestamp: exchange.timestamp,
            sources: exchange.sources.iter().map(describe_source).collect(),
        })
        .collect();

    Report {
        title: REPORT_TITLE.to_string(),
        generated_at,
        exchange_count: exchanges.len(),
        sections,
    }
}

/// Render a compiled report in the requested format.
pub fn render(report: &Report, format: ReportFormat) -> Result<Vec<u8>, ReportError> {
    match format {
        ReportFormat::Pdf => pdf::render_pdf(report),
        ReportFormat::Text => Ok(text::render_text(report)?.into_bytes()),
    }
}

fn describe_source(source: &SourceCitation) -> String {
    format!("{} (chunk {})", source.filename, source.chunk_index)
}

pub(crate) fn format_timestamp(timestamp: OffsetDateTime) -> Result<String, ReportError> {
    Ok(timestamp.format(&Rfc3339)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn exchanges(count: usize) -> Vec<Exchange> {
        (1..=count)
            .map(|n| {
                Exchange::new(
                    format!("Question {n}?"),
                    format!("Answer {n}."),
                    vec![SourceCitation {
                        document_id: None,
                        filename: format!("doc{n}.pdf"),
                        chunk_index: n,
                        score: 0.5,
                    }],
                )
            })
            .collect()
    }

    #[test]
    fn compile_numbers_sections_in_order() {
        let report = compile(&exchanges(3), OffsetDateTime::UNIX_EPOCH);
        assert_eq!(report.exchange_count, 3);
        assert_eq!(report.sections.len(), 3);
        assert_eq!(report.sections[0].number, 1);
        assert_eq!(report.sections[2].question, "Question 3?");
        assert_eq!(report.sections[1].sources, vec!["doc2.pdf (chunk 2)"]);
    }

    #[test]
    fn compile_of_empty_snapshot_has_zero_count() {
        let report = compile(&[], OffsetDateTime::UNIX_EPOCH);
        assert_eq!(report.exchange_count, 0);
        assert!(report.sections.is_empty());
    }

    #[test]
    fn format_parses_aliases() {
        assert_eq!("PDF".parse(), Ok(ReportFormat::Pdf));
        assert_eq!("txt".parse(), Ok(ReportFormat::Text));
        assert!("docx".parse::<ReportFormat>().is_err());
        assert_eq!(ReportFormat::default(), ReportFormat::Pdf);
    }
}
