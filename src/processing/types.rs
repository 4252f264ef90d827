//! Core data types and error definitions for the ingestion pipeline.

use crate::{
    embedding::EmbeddingClientError,
    extraction::{ExtractionError, FileKind},
    index::IndexError,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible window.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Tokenizer resources could not be loaded.
    #[error("failed to initialize tokenizer: {0}")]
    Tokenizer(String),
    /// The blocking chunking task panicked or was cancelled.
    #[error("chunking task aborted: {0}")]
    Aborted(String),
}

/// Errors that fail a single file during ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Format rejected or text could not be extracted.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// Raw bytes could not be written to the upload directory.
    #[error("Failed to store upload: {0}")]
    Storage(#[from] std::io::Error),
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors for the chunks.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector index rejected the chunk write.
    #[error("Failed to index chunks: {0}")]
    Index(#[from] IndexError),
}

impl IngestError {
    /// Classification reported back to the uploader.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Extraction(ExtractionError::UnsupportedFormat(_)) => FailureKind::UnsupportedFormat,
            Self::Extraction(_) | Self::Storage(_) => FailureKind::ExtractionFailed,
            Self::Chunking(_) | Self::Embedding(_) | Self::Index(_) => FailureKind::IndexingFailed,
        }
    }
}

/// Why a file ended in the failed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Extension outside the allow-list.
    UnsupportedFormat,
    /// File could not be stored or read, or contained no text.
    ExtractionFailed,
    /// Chunking, embedding or the index write failed.
    IndexingFailed,
}

/// One file received from the upload endpoint.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client supplied file name, possibly including directories.
    pub filename: String,
    /// Declared MIME type, informational only.
    pub content_type: Option<String>,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Build an upload without a declared content type.
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }
}

/// Lifecycle of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Stored, extraction not finished yet.
    Pending,
    /// Text extracted, not yet indexed.
    Extracted,
    /// Chunks are searchable.
    Indexed,
    /// Processing stopped; see the failure reason.
    Failed,
}

/// Uploaded document tracked by the ingestion coordinator.
#[derive(Debug, Clone)]
pub struct Document {
    /// Identifier assigned on upload.
    pub id: Uuid,
    /// Original file name (final path component only).
    pub filename: String,
    /// Detected format.
    pub kind: FileKind,
    /// Location of the stored raw bytes, once persisted.
    pub stored_path: Option<PathBuf>,
    /// Size of the upload in bytes.
    pub size_bytes: u64,
    /// Hex SHA-256 of the raw bytes.
    pub sha256: String,
    /// Extracted text, present once extraction succeeded.
    pub text: Option<String>,
    /// Current processing state.
    pub status: DocumentStatus,
    /// Number of chunks written to the index.
    pub chunk_count: usize,
    /// Failure description when `status` is [`DocumentStatus::Failed`].
    pub failure: Option<String>,
    /// Time the upload was received.
    pub uploaded_at: OffsetDateTime,
}

impl Document {
    /// Register a freshly uploaded file in the `Pending` state.
    pub fn new(filename: impl Into<String>, kind: FileKind, bytes: &[u8]) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            kind,
            stored_path: None,
            size_bytes: bytes.len() as u64,
            sha256: hex::encode(Sha256::digest(bytes)),
            text: None,
            status: DocumentStatus::Pending,
            chunk_count: 0,
            failure: None,
            uploaded_at: OffsetDateTime::now_utc(),
        }
    }

    /// Summary without the extracted text.
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id,
            filename: self.filename.clone(),
            kind: self.kind,
            size_bytes: self.size_bytes,
            sha256: self.sha256.clone(),
            status: self.status,
            chunk_count: self.chunk_count,
            text_chars: self.text.as_ref().map(|text| text.chars().count()),
            failure: self.failure.clone(),
            uploaded_at: self.uploaded_at,
        }
    }
}

/// Document view returned by `GET /documents`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    /// Document identifier.
    pub id: Uuid,
    /// Original file name.
    pub filename: String,
    /// Detected format.
    pub kind: FileKind,
    /// Upload size in bytes.
    pub size_bytes: u64,
    /// Hex SHA-256 of the upload.
    pub sha256: String,
    /// Current processing state.
    pub status: DocumentStatus,
    /// Chunks written to the index.
    pub chunk_count: usize,
    /// Length of the extracted text in characters, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_chars: Option<usize>,
    /// Failure description, when failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Upload time.
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
}

/// Final state of one uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Chunks are searchable.
    Indexed,
    /// File was rejected or failed during processing.
    Failed,
}

/// Per-file result returned by the upload endpoint, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    /// File name as reported by the client (final path component).
    pub filename: String,
    /// Outcome for this file.
    pub status: FileStatus,
    /// Document identifier, absent when the format was rejected up front.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Uuid>,
    /// Number of chunks indexed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<usize>,
    /// Failure classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
    /// Human readable failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    /// Report a successfully indexed document.
    pub fn indexed(filename: String, document_id: Uuid, chunks: usize) -> Self {
        Self {
            filename,
            status: FileStatus::Indexed,
            document_id: Some(document_id),
            chunks: Some(chunks),
            error_kind: None,
            error: None,
        }
    }

    /// Report a failed file.
    pub fn failed(filename: String, document_id: Option<Uuid>, error: &IngestError) -> Self {
        Self {
            filename,
            status: FileStatus::Failed,
            document_id,
            chunks: None,
            error_kind: Some(error.kind()),
            error: Some(error.to_string()),
        }
    }

    /// Whether the file made it into the index.
    pub fn is_indexed(&self) -> bool {
        self.status == FileStatus::Indexed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_kinds_follow_pipeline_stage() {
        let unsupported = IngestError::from(ExtractionError::UnsupportedFormat(".exe".into()));
        assert_eq!(unsupported.kind(), FailureKind::UnsupportedFormat);

        let empty = IngestError::from(ExtractionError::Empty(FileKind::Txt));
        assert_eq!(empty.kind(), FailureKind::ExtractionFailed);

        let embedding =
            IngestError::from(EmbeddingClientError::GenerationFailed("offline".into()));
        assert_eq!(embedding.kind(), FailureKind::IndexingFailed);
    }

    #[test]
    fn failed_report_serializes_kind_in_snake_case() {
        let error = IngestError::from(ExtractionError::UnsupportedFormat(".exe".into()));
        let report = FileReport::failed("tool.exe".into(), None, &error);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error_kind"], "unsupported_format");
        assert!(json.get("document_id").is_none());
        assert!(json.get("chunks").is_none());
    }

    #[test]
    fn new_document_hashes_content() {
        let document = Document::new("a.txt", FileKind::Txt, b"abc");
        assert_eq!(document.status, DocumentStatus::Pending);
        assert_eq!(document.size_bytes, 3);
        assert_eq!(
            document.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
