//! Helpers for naming and persisting uploaded files.

use std::path::{Path, PathBuf};
use uuid::Uuid;

const FALLBACK_NAME: &str = "upload";

/// Keep only the final path component of a client supplied file name.
pub(crate) fn display_name(raw: &str) -> String {
    let last = raw
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .unwrap_or_default();
    if last.is_empty() || last == "." || last == ".." {
        FALLBACK_NAME.to_string()
    } else {
        last.to_string()
    }
}

/// Replace characters that are unsafe in file names, keeping the extension readable.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = display_name(name)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = sanitized.trim_start_matches('.');
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Write the raw upload as `<document-id>-<sanitized name>` inside `dir`.
pub(crate) async fn persist_upload(
    dir: &Path,
    document_id: Uuid,
    filename: &str,
    bytes: &[u8],
) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{document_id}-{}", sanitize_filename(filename)));
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

/// Cache extracted text as `<document-id>.txt` inside `dir`.
pub(crate) async fn cache_extracted_text(
    dir: &Path,
    document_id: Uuid,
    text: &str,
) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{document_id}.txt"));
    tokio::fs::write(&path, text).await?;
    Ok(path)
}
