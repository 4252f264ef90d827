//! Service facade shared by the HTTP surface.
//!
//! [`Assistant`] owns the single conversation, the ingestion coordinator and the chat
//! orchestrator. The router is generic over [`AssistantApi`] so handlers can be exercised
//! against a stub.

use crate::{
    chat::{ChatAnswer, ChatError, ChatService, ChatSettings},
    config::Config,
    conversation::{ConversationState, Exchange},
    embedding::{EmbeddingClient, EmbeddingClientError, build_embedding_client},
    generation::{GenerationClient, GenerationClientError, build_generation_client},
    index::{IndexError, VectorIndex},
    metrics::{AssistantMetrics, MetricsSnapshot},
    processing::{DocumentSummary, FileReport, IngestSettings, IngestionService, UploadedFile},
    qdrant::{QdrantError, QdrantService},
    report::{self, ReportError, ReportFormat},
};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

/// Errors raised while wiring the assistant at startup.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Embedding provider could not be configured.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// Generation provider could not be configured.
    #[error(transparent)]
    Generation(#[from] GenerationClientError),
    /// Qdrant client could not be created.
    #[error(transparent)]
    Qdrant(#[from] QdrantError),
    /// Collection could not be prepared.
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Vector index reachability as reported by `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct IndexHealth {
    /// Whether the count request succeeded.
    pub reachable: bool,
    /// Number of stored chunks, when reachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<u64>,
    /// Failure description, when unreachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Payload returned by `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    /// Always `"ok"` while the process serves requests.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Exchanges currently in the conversation.
    pub exchanges: usize,
    /// Documents indexed since startup.
    pub documents_indexed: usize,
    /// Vector index state.
    pub index: IndexHealth,
    /// Activity counters.
    pub metrics: MetricsSnapshot,
}

/// Operations exposed over HTTP.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    /// Ingest uploaded files, returning one report per file in input order.
    async fn upload(&self, files: Vec<UploadedFile>) -> Vec<FileReport>;

    /// Answer a question and record it in the conversation.
    async fn chat(&self, question: &str) -> Result<ChatAnswer, ChatError>;

    /// Render the current conversation.
    async fn report(&self, format: ReportFormat) -> Result<Vec<u8>, ReportError>;

    /// Empty the conversation; indexed documents are kept.
    async fn clear(&self);

    /// Copy of the current conversation.
    async fn history(&self) -> Vec<Exchange>;

    /// Summaries of uploaded documents.
    async fn documents(&self) -> Vec<DocumentSummary>;

    /// Liveness and counters.
    async fn health(&self) -> HealthSnapshot;
}

/// Production implementation of [`AssistantApi`].
pub struct Assistant {
    ingestion: IngestionService,
    chat: ChatService,
    conversation: Arc<ConversationState>,
    index: Arc<dyn VectorIndex>,
    metrics: Arc<AssistantMetrics>,
}

impl Assistant {
    /// Wire the assistant from its three external collaborators.
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        generator: Arc<dyn GenerationClient>,
        index: Arc<dyn VectorIndex>,
        ingest_settings: IngestSettings,
        chat_settings: ChatSettings,
    ) -> Self {
        let conversation = Arc::new(ConversationState::new());
        let metrics = Arc::new(AssistantMetrics::new());
        let ingestion = IngestionService::new(
            embedder.clone(),
            index.clone(),
            metrics.clone(),
            ingest_settings,
        );
        let chat = ChatService::new(
            embedder,
            generator,
            index.clone(),
            conversation.clone(),
            metrics.clone(),
            chat_settings,
        );
        Self {
            ingestion,
            chat,
            conversation,
            index,
            metrics,
        }
    }

    /// Build the HTTP-backed collaborators from configuration and prepare the collection.
    pub async fn from_config(config: &Config) -> Result<Self, StartupError> {
        tracing::info!("Initializing embedding client");
        let embedder = build_embedding_client(config)?;
        let generator = build_generation_client(config)?;
        let qdrant = QdrantService::new(config)?;
        tracing::debug!(
            collection = qdrant.collection(),
            vector_size = config.embedding_dimension,
            "Ensuring collection"
        );
        let index: Arc<dyn VectorIndex> = Arc::new(qdrant);
        index.ensure_ready().await?;
        tracing::info!(collection = %config.qdrant_collection_name, "Collection ready");

        Ok(Self::new(
            embedder,
            generator,
            index,
            IngestSettings::from_config(config),
            ChatSettings::from_config(config),
        ))
    }

    /// Shared conversation handle.
    pub fn conversation(&self) -> Arc<ConversationState> {
        self.conversation.clone()
    }
}

#[async_trait]
impl AssistantApi for Assistant {
    async fn upload(&self, files: Vec<UploadedFile>) -> Vec<FileReport> {
        self.ingestion.ingest(files).await
    }

    async fn chat(&self, question: &str) -> Result<ChatAnswer, ChatError> {
        self.chat.ask(question).await
    }

    async fn report(&self, format: ReportFormat) -> Result<Vec<u8>, ReportError> {
        let snapshot = self.conversation.snapshot().await;
        let compiled = report::compile(&snapshot, OffsetDateTime::now_utc());
        let bytes = report::render(&compiled, format)?;
        tracing::info!(
            exchanges = compiled.exchange_count,
            ?format,
            bytes = bytes.len(),
            "Report rendered"
        );
        Ok(bytes)
    }

    async fn clear(&self) {
        self.conversation.clear().await;
    }

    async fn history(&self) -> Vec<Exchange> {
        self.conversation.snapshot().await
    }

    async fn documents(&self) -> Vec<DocumentSummary> {
        self.ingestion.documents().await
    }

    async fn health(&self) -> HealthSnapshot {
        let index = match self.index.count().await {
            Ok(chunks) => IndexHealth {
                reachable: true,
                chunks: Some(chunks),
                error: None,
            },
            Err(error) => IndexHealth {
                reachable: false,
                chunks: None,
                error: Some(error.to_string()),
            },
        };
        HealthSnapshot {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            exchanges: self.conversation.len().await,
            documents_indexed: self.ingestion.indexed_documents().await,
            index,
            metrics: self.metrics.snapshot(),
        }
    }
}
