//! Retrieval-augmented question answering over the shared conversation.

use crate::{
    chat::prompt::{build_answer_messages, build_condense_messages, citations_from_hits},
    config::Config,
    conversation::{ConversationState, Exchange, SourceCitation},
    embedding::{EmbeddingClient, EmbeddingClientError},
    generation::{GenerationClient, GenerationClientError, GenerationRequest},
    index::{IndexError, VectorIndex},
    metrics::AssistantMetrics,
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors that fail a single chat call.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The question was blank.
    #[error("Question must not be empty")]
    EmptyQuestion,
    /// Nothing has been indexed yet, so there is no context to answer from.
    #[error("No indexed documents are available; upload documents first")]
    RetrievalUnavailable,
    /// The question could not be embedded.
    #[error("Failed to embed question: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// The generation provider failed.
    #[error("Failed to generate answer: {0}")]
    Generation(#[from] GenerationClientError),
    /// The vector index could not be queried.
    #[error("Vector index unavailable: {0}")]
    Index(#[from] IndexError),
}

/// Answer returned to the caller; the same content is appended to the conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatAnswer {
    /// Identifier of the recorded exchange.
    pub exchange_id: Uuid,
    /// Generated answer text.
    pub answer: String,
    /// Chunks the answer was grounded on, best first.
    pub sources: Vec<SourceCitation>,
}

/// Knobs controlling retrieval and generation.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    /// Chat model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Rewrite follow-ups into standalone questions before retrieval.
    pub condense_follow_ups: bool,
}

impl ChatSettings {
    /// Derive settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.chat_model.clone(),
            temperature: config.chat_temperature,
            top_k: config.retrieval_top_k,
            condense_follow_ups: config.condense_follow_ups,
        }
    }
}

/// Composes retrieval, history and generation into one answer per question.
pub struct ChatService {
    embedder: Arc<dyn EmbeddingClient>,
    generator: Arc<dyn GenerationClient>,
    index: Arc<dyn VectorIndex>,
    conversation: Arc<ConversationState>,
    metrics: Arc<AssistantMetrics>,
    settings: ChatSettings,
}

impl ChatService {
    /// Wire the orchestrator to its collaborators.
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        generator: Arc<dyn GenerationClient>,
        index: Arc<dyn VectorIndex>,
        conversation: Arc<ConversationState>,
        metrics: Arc<AssistantMetrics>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            embedder,
            generator,
            index,
            conversation,
            metrics,
            settings,
        }
    }

    /// Answer `question` from indexed documents and record the exchange.
    pub async fn ask(&self, question: &str) -> Result<ChatAnswer, ChatError> {
        match self.answer(question).await {
            Ok(answer) => {
                self.metrics.record_answer();
                Ok(answer)
            }
            Err(error) => {
                self.metrics.record_chat_failure();
                tracing::warn!(error = %error, "Chat request failed");
                Err(error)
            }
        }
    }

    async fn answer(&self, question: &str) -> Result<ChatAnswer, ChatError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyQuestion);
        }
        if self.index.count().await? == 0 {
            return Err(ChatError::RetrievalUnavailable);
        }

        let history = self.conversation.snapshot().await;
        let search_text = if self.settings.condense_follow_ups && !history.is_empty() {
            self.condense(question, &history).await?
        } else {
            question.to_string()
        };

        let vector = self
            .embedder
            .generate_embeddings(vec![search_text])
            .await?
            .pop()
            .ok_or_else(|| {
                EmbeddingClientError::InvalidResponse("no vector returned for question".into())
            })?;

        let hits = self.index.search(vector, self.settings.top_k).await?;
        if hits.is_empty() {
            return Err(ChatError::RetrievalUnavailable);
        }
        tracing::debug!(
            hits = hits.len(),
            history = history.len(),
            top_score = hits[0].score,
            "Retrieved context"
        );

        let answer = self
            .generator
            .generate(GenerationRequest {
                model: self.settings.model.clone(),
                messages: build_answer_messages(question, &hits, &history),
                temperature: self.settings.temperature,
            })
            .await?;

        let sources = citations_from_hits(&hits);
        let exchange = Exchange::new(question, answer.clone(), sources.clone());
        let exchange_id = exchange.id;
        self.conversation.append(exchange).await;
        tracing::info!(
            exchange_id = %exchange_id,
            sources = sources.len(),
            "Answered question"
        );

        Ok(ChatAnswer {
            exchange_id,
            answer,
            sources,
        })
    }

    async fn condense(&self, question: &str, history: &[Exchange]) -> Result<String, ChatError> {
        let rewritten = self
            .generator
            .generate(GenerationRequest {
                model: self.settings.model.clone(),
                messages: build_condense_messages(question, history),
                temperature: 0.0,
            })
            .await?;
        let rewritten = rewritten.trim();
        tracing::debug!(original = question, standalone = rewritten, "Condensed follow-up question");
        if rewritten.is_empty() {
            Ok(question.to_string())
        } else {
            Ok(rewritten.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        embedding::HashEmbeddingClient,
        generation::ChatRole,
        index::{ChunkHit, ChunkRecord},
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedIndex {
        hits: Vec<ChunkHit>,
    }

    #[async_trait]
    impl VectorIndex for FixedIndex {
        async fn ensure_ready(&self) -> Result<(), IndexError> {
            Ok(())
        }

        async fn upsert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<usize, IndexError> {
            Ok(chunks.len())
        }

        async fn search(&self, _: Vec<f32>, limit: usize) -> Result<Vec<ChunkHit>, IndexError> {
            Ok(self.hits.iter().take(limit).cloned().collect())
        }

        async fn count(&self) -> Result<u64, IndexError> {
            Ok(self.hits.len() as u64)
        }
    }

    #[derive(Default)]
    struct ScriptedGenerator {
        requests: Mutex<Vec<GenerationRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl GenerationClient for ScriptedGenerator {
        async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError> {
            if self.fail {
                return Err(GenerationClientError::GenerationFailed("quota exceeded".into()));
            }
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            Ok(format!("answer {}", requests.len()))
        }
    }

    fn hit(filename: &str, chunk_index: usize) -> ChunkHit {
        ChunkHit {
            id: format!("{filename}-{chunk_index}"),
            score: 0.5,
            document_id: Some(Uuid::nil()),
            filename: filename.into(),
            chunk_index,
            text: format!("text of {filename} chunk {chunk_index}"),
        }
    }

    fn settings(condense: bool) -> ChatSettings {
        ChatSettings {
            model: "test-chat".into(),
            temperature: 0.7,
            top_k: 2,
            condense_follow_ups: condense,
        }
    }

    fn service(
        hits: Vec<ChunkHit>,
        generator: Arc<ScriptedGenerator>,
        condense: bool,
    ) -> (ChatService, Arc<ConversationState>, Arc<AssistantMetrics>) {
        let conversation = Arc::new(ConversationState::new());
        let metrics = Arc::new(AssistantMetrics::new());
        let service = ChatService::new(
            Arc::new(HashEmbeddingClient::new(8)),
            generator,
            Arc::new(FixedIndex { hits }),
            conversation.clone(),
            metrics.clone(),
            settings(condense),
        );
        (service, conversation, metrics)
    }

    #[tokio::test]
    async fn answers_and_records_exchange() {
        let generator = Arc::new(ScriptedGenerator::default());
        let (service, conversation, metrics) =
            service(vec![hit("a.txt", 0), hit("a.txt", 1), hit("b.txt", 0)], generator.clone(), false);

        let answer = service.ask("  What is in a.txt?  ").await.unwrap();

        assert_eq!(answer.answer, "answer 1");
        assert_eq!(answer.sources.len(), 2);
        let snapshot = conversation.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, answer.exchange_id);
        assert_eq!(snapshot[0].question, "What is in a.txt?");
        assert_eq!(metrics.snapshot().chat_answers, 1);

        let requests = generator.requests.lock().unwrap();
        assert_eq!(requests[0].model, "test-chat");
        assert!((requests[0].temperature - 0.7).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn later_questions_see_history() {
        let generator = Arc::new(ScriptedGenerator::default());
        let (service, _, _) = service(vec![hit("a.txt", 0)], generator.clone(), false);

        service.ask("first").await.unwrap();
        service.ask("second").await.unwrap();

        let requests = generator.requests.lock().unwrap();
        let roles: Vec<_> = requests[1].messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![ChatRole::System, ChatRole::User, ChatRole::Assistant, ChatRole::User]
        );
        assert_eq!(requests[1].messages[2].content, "answer 1");
    }

    #[tokio::test]
    async fn empty_index_is_retrieval_unavailable() {
        let generator = Arc::new(ScriptedGenerator::default());
        let (service, conversation, metrics) = service(Vec::new(), generator.clone(), false);

        let error = service.ask("anything?").await.unwrap_err();

        assert!(matches!(error, ChatError::RetrievalUnavailable));
        assert!(generator.requests.lock().unwrap().is_empty());
        assert!(conversation.is_empty().await);
        assert_eq!(metrics.snapshot().chat_failures, 1);
    }

    #[tokio::test]
    async fn blank_question_is_rejected() {
        let generator = Arc::new(ScriptedGenerator::default());
        let (service, _, _) = service(vec![hit("a.txt", 0)], generator, false);
        assert!(matches!(
            service.ask("   ").await,
            Err(ChatError::EmptyQuestion)
        ));
    }

    #[tokio::test]
    async fn generation_failure_records_nothing() {
        let generator = Arc::new(ScriptedGenerator {
            fail: true,
            ..Default::default()
        });
        let (service, conversation, _) = service(vec![hit("a.txt", 0)], generator, false);

        let error = service.ask("question").await.unwrap_err();
        assert!(matches!(error, ChatError::Generation(_)));
        assert!(conversation.is_empty().await);
    }

    #[tokio::test]
    async fn follow_ups_are_condensed_but_original_question_is_kept() {
        let generator = Arc::new(ScriptedGenerator::default());
        let (service, conversation, _) = service(vec![hit("a.txt", 0)], generator.clone(), true);

        service.ask("Who wrote a.txt?").await.unwrap();
        service.ask("When?").await.unwrap();

        let requests = generator.requests.lock().unwrap();
        // first answer, condense call, second answer
        assert_eq!(requests.len(), 3);
        assert!((requests[1].temperature - 0.0).abs() < f32::EPSILON);
        assert!(requests[1].messages[1].content.contains("Follow-up question: When?"));

        let snapshot = conversation.snapshot().await;
        assert_eq!(snapshot[1].question, "When?");
    }
}
