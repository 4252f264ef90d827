//! Shared conversation log.
//!
//! One [`ConversationState`] exists per process and is shared through an `Arc`. Appends take
//! the write guard and snapshots take the read guard, so a reader sees either all of an
//! exchange or none of it.

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Reference to an indexed chunk used to answer a question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCitation {
    /// Source document, when known.
    pub document_id: Option<Uuid>,
    /// Source file name.
    pub filename: String,
    /// Position of the chunk inside the document.
    pub chunk_index: usize,
    /// Similarity score of the chunk.
    pub score: f32,
}

/// One question and its answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exchange {
    /// Identifier assigned when the exchange is recorded.
    pub id: Uuid,
    /// Question as asked by the user.
    pub question: String,
    /// Generated answer.
    pub answer: String,
    /// Chunks cited for the answer, best first.
    pub sources: Vec<SourceCitation>,
    /// Time the answer was produced.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl Exchange {
    /// Record a new exchange stamped with the current time.
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        sources: Vec<SourceCitation>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            question: question.into(),
            answer: answer.into(),
            sources,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Ordered, append-only log of exchanges that can be cleared as a whole.
#[derive(Debug, Default)]
pub struct ConversationState {
    exchanges: RwLock<Vec<Exchange>>,
}

impl ConversationState {
    /// Create an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an exchange at the end of the log.
    pub async fn append(&self, exchange: Exchange) {
        let mut exchanges = self.exchanges.write().await;
        exchanges.push(exchange);
        tracing::debug!(exchanges = exchanges.len(), "Exchange recorded");
    }

    /// Remove every exchange.
    pub async fn clear(&self) {
        let mut exchanges = self.exchanges.write().await;
        let removed = exchanges.len();
        exchanges.clear();
        tracing::info!(removed, "Conversation cleared");
    }

    /// Copy of the current log.
    pub async fn snapshot(&self) -> Vec<Exchange> {
        self.exchanges.read().await.clone()
    }

    /// Number of recorded exchanges.
    pub async fn len(&self) -> usize {
        self.exchanges.read().await.len()
    }

    /// Whether no exchange has been recorded since the last clear.
    pub async fn is_empty(&self) -> bool {
        self.exchanges.read().await.is_empty()
    }
}
