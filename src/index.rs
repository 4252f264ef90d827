//! Vector index port.
//!
//! The ingestion coordinator and the chat orchestrator talk to the similarity store through
//! [`VectorIndex`]; [`crate::qdrant::QdrantService`] is the production implementation.

use crate::qdrant::QdrantError;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Errors returned by vector index implementations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Qdrant transport or response failure.
    #[error("Vector index request failed: {0}")]
    Qdrant(#[from] QdrantError),
    /// Backend refused the operation for another reason.
    #[error("Vector index unavailable: {0}")]
    Unavailable(String),
}

/// Embedded chunk ready to be written to the index.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    /// Document the chunk was cut from.
    pub document_id: Uuid,
    /// Original filename of the document, kept for citations.
    pub filename: String,
    /// Zero-based position of the chunk inside its document.
    pub chunk_index: usize,
    /// Chunk text.
    pub text: String,
    /// SHA-256 digest of the chunk text.
    pub chunk_hash: String,
    /// Embedding vector.
    pub vector: Vec<f32>,
}

/// Nearest-neighbour match returned by [`VectorIndex::search`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkHit {
    /// Point identifier assigned by the index.
    pub id: String,
    /// Similarity score (higher is closer).
    pub score: f32,
    /// Source document, when recorded in the payload.
    pub document_id: Option<Uuid>,
    /// Source filename.
    pub filename: String,
    /// Position of the chunk inside its document.
    pub chunk_index: usize,
    /// Chunk text.
    pub text: String,
}

/// Capability interface over the external similarity store.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Make sure the backing collection exists with the expected vector size.
    async fn ensure_ready(&self) -> Result<(), IndexError>;

    /// Persist the supplied chunks, returning how many points were written.
    async fn upsert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<usize, IndexError>;

    /// Return up to `limit` chunks closest to `vector`, best first.
    async fn search(&self, vector: Vec<f32>, limit: usize) -> Result<Vec<ChunkHit>, IndexError>;

    /// Number of chunks currently stored.
    async fn count(&self) -> Result<u64, IndexError>;
}
