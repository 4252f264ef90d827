//! Ingestion coordinator: store, extract, chunk, embed and index uploaded files.

use crate::{
    config::{ChunkUnit, Config},
    embedding::{EmbeddingClient, EmbeddingClientError},
    extraction::{ExtractionError, ExtractorRegistry, FileKind},
    index::VectorIndex,
    metrics::AssistantMetrics,
    processing::{
        chunking::chunk_text,
        mappers::{dedupe_chunks, to_records},
        registry::DocumentRegistry,
        storage::{cache_extracted_text, display_name, persist_upload},
        types::{
            ChunkingError, Document, DocumentStatus, DocumentSummary, FileReport, IngestError,
            UploadedFile,
        },
    },
};
use futures_util::{StreamExt, stream};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Knobs controlling how uploads are processed.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Window size handed to the chunker.
    pub chunk_size: usize,
    /// Overlap between consecutive windows.
    pub chunk_overlap: usize,
    /// Unit for size and overlap.
    pub chunk_unit: ChunkUnit,
    /// Files processed concurrently within one batch.
    pub concurrency: usize,
    /// Directory receiving raw uploads.
    pub upload_dir: PathBuf,
    /// Directory caching extracted text, when enabled.
    pub extract_cache_dir: Option<PathBuf>,
}

impl IngestSettings {
    /// Derive settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            chunk_unit: config.chunk_unit,
            concurrency: config.ingest_concurrency,
            upload_dir: config.upload_dir.clone(),
            extract_cache_dir: config.extract_cache_dir.clone(),
        }
    }
}

/// Coordinates the ingestion pipeline for uploaded files.
///
/// Each file moves through persist → extract → chunk → embed → index independently; a failure
/// only marks that file as failed. Writes to the vector index are serialized by a
/// service-wide lock so concurrent batches never interleave their upserts.
pub struct IngestionService {
    embedder: Arc<dyn EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
    extractors: ExtractorRegistry,
    documents: DocumentRegistry,
    metrics: Arc<AssistantMetrics>,
    settings: IngestSettings,
    index_write_lock: Mutex<()>,
}

impl IngestionService {
    /// Build a coordinator using the default extractor set.
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        index: Arc<dyn VectorIndex>,
        metrics: Arc<AssistantMetrics>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            embedder,
            index,
            extractors: ExtractorRegistry::default(),
            documents: DocumentRegistry::new(),
            metrics,
            settings,
            index_write_lock: Mutex::new(()),
        }
    }

    /// Replace the extractor registry.
    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = extractors;
        self
    }

    /// Process a batch of uploads, returning one report per file in input order.
    pub async fn ingest(&self, files: Vec<UploadedFile>) -> Vec<FileReport> {
        let total = files.len();
        tracing::info!(files = total, "Ingesting upload batch");

        let reports: Vec<FileReport> = stream::iter(files)
            .map(|file| self.ingest_file(file))
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let indexed = reports.iter().filter(|report| report.is_indexed()).count();
        tracing::info!(
            files = total,
            indexed,
            failed = total - indexed,
            "Upload batch finished"
        );
        reports
    }

    /// Summaries of every document seen since startup.
    pub async fn documents(&self) -> Vec<DocumentSummary> {
        self.documents.summaries().await
    }

    /// Full record for one document, including extracted text.
    pub async fn document(&self, id: Uuid) -> Option<Document> {
        self.documents.get(id).await
    }

    /// Number of documents currently indexed.
    pub async fn indexed_documents(&self) -> usize {
        self.documents.indexed_count().await
    }

    async fn ingest_file(&self, file: UploadedFile) -> FileReport {
        let filename = display_name(&file.filename);
        let kind = match FileKind::from_filename(&filename) {
            Ok(kind) => kind,
            Err(error) => {
                let error = IngestError::from(error);
                tracing::warn!(filename = %filename, content_type = ?file.content_type, error = %error, "Rejected upload");
                self.metrics.record_failed_document();
                return FileReport::failed(filename, None, &error);
            }
        };

        let document = Document::new(filename.clone(), kind, &file.bytes);
        let document_id = document.id;
        self.documents.insert(document).await;

        match self.process(document_id, &filename, kind, file.bytes).await {
            Ok(chunks) => {
                self.metrics.record_document(chunks as u64);
                FileReport::indexed(filename, document_id, chunks)
            }
            Err(error) => {
                tracing::warn!(
                    document_id = %document_id,
                    filename = %filename,
                    kind = ?error.kind(),
                    error = %error,
                    "Document failed"
                );
                self.documents
                    .mark_failed(document_id, error.to_string())
                    .await;
                self.metrics.record_failed_document();
                FileReport::failed(filename, Some(document_id), &error)
            }
        }
    }

    async fn process(
        &self,
        document_id: Uuid,
        filename: &str,
        kind: FileKind,
        bytes: Vec<u8>,
    ) -> Result<usize, IngestError> {
        let stored = persist_upload(&self.settings.upload_dir, document_id, filename, &bytes).await?;
        tracing::debug!(document_id = %document_id, path = %stored.display(), "Stored upload");
        self.documents
            .update(document_id, |document| document.stored_path = Some(stored))
            .await;

        let text = self
            .extractors
            .extract(kind, filename, Arc::new(bytes))
            .await?;

        if let Some(dir) = &self.settings.extract_cache_dir
            && let Err(error) = cache_extracted_text(dir, document_id, &text).await
        {
            tracing::warn!(document_id = %document_id, error = %error, "Failed to cache extracted text");
        }

        let (chunk_size, chunk_overlap, chunk_unit) = (
            self.settings.chunk_size,
            self.settings.chunk_overlap,
            self.settings.chunk_unit,
        );
        let (text, chunks) = tokio::task::spawn_blocking(move || {
            let chunks = chunk_text(&text, chunk_size, chunk_overlap, chunk_unit);
            (text, chunks)
        })
        .await
        .map_err(|error| ChunkingError::Aborted(error.to_string()))?;
        let chunks = chunks?;
        self.documents
            .update(document_id, |document| {
                document.text = Some(text);
                document.status = DocumentStatus::Extracted;
            })
            .await;

        let (prepared, skipped_duplicates) = dedupe_chunks(chunks);
        if prepared.is_empty() {
            return Err(ExtractionError::Empty(kind).into());
        }

        let texts: Vec<String> = prepared.iter().map(|chunk| chunk.text.clone()).collect();
        let expected = texts.len();
        let vectors = self.embedder.generate_embeddings(texts).await?;
        if vectors.len() != expected {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "expected {expected} vectors, got {}",
                vectors.len()
            ))
            .into());
        }

        let records = to_records(document_id, filename, prepared, vectors);
        let written = {
            let _guard = self.index_write_lock.lock().await;
            self.index.upsert_chunks(records).await?
        };

        self.documents
            .update(document_id, |document| {
                document.status = DocumentStatus::Indexed;
                document.chunk_count = written;
            })
            .await;
        tracing::info!(
            document_id = %document_id,
            filename,
            %kind,
            chunks = written,
            skipped_duplicates,
            "Document indexed"
        );
        Ok(written)
    }
}
