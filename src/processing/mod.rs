//! Document ingestion pipeline: storage, extraction, chunking, embedding and indexing.

pub mod chunking;
mod mappers;
mod registry;
mod service;
mod storage;
pub mod types;

pub use registry::DocumentRegistry;
pub use service::{IngestSettings, IngestionService};
pub use types::{
    ChunkingError, Document, DocumentStatus, DocumentSummary, FailureKind, FileReport,
    FileStatus, IngestError, UploadedFile,
};
