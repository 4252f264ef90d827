use super::{EMPTY_NOTICE, Report, ReportError, format_timestamp};

/// Render the report as UTF-8 plain text.
pub(super) fn render_text(report: &Report) -> Result<String, ReportError> {
    let mut out = String::new();
    out.push_str(&format!("{}\n", report.title));
    out.push_str(&format!(
        "Generated: {}\n",
        format_timestamp(report.generated_at)?
    ));
    out.push_str(&format!("Exchanges: {}\n", report.exchange_count));

    if report.sections.is_empty() {
        out.push_str(&format!("\n{EMPTY_NOTICE}\n"));
        return Ok(out);
    }

    for section in &report.sections {
        out.push_str(&format!(
            "\n== Exchange {} ({}) ==\n",
            section.number,
            format_timestamp(section.timestamp)?
        ));
        out.push_str(&format!("Question: {}\n", section.question.trim()));
        out.push_str(&format!("Answer:\n{}\n", section.answer.trim()));
        if !section.sources.is_empty() {
            out.push_str(&format!("Sources: {}\n", section.sources.join(", ")));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{compile, tests::exchanges};
    use time::OffsetDateTime;

    #[test]
    fn renders_header_and_sections() {
        let report = compile(&exchanges(3), OffsetDateTime::UNIX_EPOCH);
        let text = render_text(&report).unwrap();

        assert!(text.starts_with("RAG Conversation Report\nGenerated: 1970-01-01T00:00:00Z\nExchanges: 3\n"));
        assert_eq!(text.matches("== Exchange ").count(), 3);
        assert!(text.contains("Question: Question 2?"));
        assert!(text.contains("Answer:\nAnswer 3."));
        assert!(text.contains("Sources: doc1.pdf (chunk 1)"));
    }

    #[test]
    fn empty_report_has_notice() {
        let report = compile(&[], OffsetDateTime::UNIX_EPOCH);
        let text = render_text(&report).unwrap();
        assert!(text.contains("Exchanges: 0"));
        assert!(text.contains("No exchanges recorded."));
        assert!(!text.contains("== Exchange"));
    }
}
