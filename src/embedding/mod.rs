//! Embedding client abstraction and adapters.
//!
//! The pipeline only depends on [`EmbeddingClient`]; the concrete provider is picked from
//! configuration by [`build_embedding_client`].

mod hash;
mod ollama;
mod openai;

pub use hash::HashEmbeddingClient;
pub use ollama::OllamaEmbeddingClient;
pub use openai::OpenAiEmbeddingClient;

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider could not be reached or configured.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider answered with a payload we could not interpret.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied chunk of text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Build an embedding client suitable for the current configuration.
pub fn build_embedding_client(
    config: &Config,
) -> Result<Arc<dyn EmbeddingClient>, EmbeddingClientError> {
    let timeout = Duration::from_secs(config.http_timeout_secs);
    tracing::debug!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        dimension = config.embedding_dimension,
        "Building embedding client"
    );
    let client: Arc<dyn EmbeddingClient> = match config.embedding_provider {
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbeddingClient::new(
            &config.ollama_url,
            &config.embedding_model,
            timeout,
        )?),
        EmbeddingProvider::OpenAI => {
            let api_key = config.llm_api_key.clone().ok_or_else(|| {
                EmbeddingClientError::ProviderUnavailable("LLM_API_KEY is not set".into())
            })?;
            Arc::new(OpenAiEmbeddingClient::new(
                &config.openai_base_url,
                &config.embedding_model,
                api_key,
                timeout,
            )?)
        }
        EmbeddingProvider::Hash => Arc::new(HashEmbeddingClient::new(config.embedding_dimension)),
    };
    Ok(client)
}

/// Ensure a provider returned exactly one vector per input.
pub(crate) fn check_vector_count(
    expected: usize,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
    if vectors.len() == expected {
        Ok(vectors)
    } else {
        Err(EmbeddingClientError::InvalidResponse(format!(
            "expected {expected} vectors, got {}",
            vectors.len()
        )))
    }
}

pub(crate) fn http_client(
    user_agent: &str,
    timeout: Duration,
) -> Result<reqwest::Client, EmbeddingClientError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(|error| EmbeddingClientError::ProviderUnavailable(error.to_string()))
}
