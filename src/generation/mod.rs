//! Abstractions for answer generation via hosted or local chat models.
//!
//! The Ollama adapter issues HTTP requests directly to the runtime, the OpenAI adapter targets any
//! OpenAI-compatible `chat/completions` endpoint. Neither retries: failures surface to the caller.

mod ollama;
mod openai;

pub use ollama::OllamaGenerationClient;
pub use openai::OpenAiGenerationClient;

use crate::config::{Config, GenerationProvider};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced while generating an answer.
#[derive(Debug, Error)]
pub enum GenerationClientError {
    /// Provider was unreachable or misconfigured.
    #[error("Generation provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate answer: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions framing the conversation.
    System,
    /// The human asking questions.
    User,
    /// Previous model answers.
    Assistant,
}

/// Single message passed to the chat model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Who is speaking.
    pub role: ChatRole,
    /// Message body.
    pub content: String,
}

impl ChatMessage {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Build an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Request payload passed to the generation provider.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Fully qualified model identifier understood by the provider.
    pub model: String,
    /// Ordered chat transcript ending with the message to answer.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Interface implemented by answer generation providers.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Produce the assistant reply for the supplied transcript.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError>;
}

/// Build a generation client based on configuration.
pub fn build_generation_client(
    config: &Config,
) -> Result<Arc<dyn GenerationClient>, GenerationClientError> {
    let timeout = Duration::from_secs(config.http_timeout_secs);
    tracing::debug!(
        provider = ?config.generation_provider,
        model = %config.chat_model,
        "Building generation client"
    );
    let client: Arc<dyn GenerationClient> = match config.generation_provider {
        GenerationProvider::Ollama => {
            Arc::new(OllamaGenerationClient::new(&config.ollama_url, timeout)?)
        }
        GenerationProvider::OpenAI => {
            let api_key = config.llm_api_key.clone().ok_or_else(|| {
                GenerationClientError::ProviderUnavailable("LLM_API_KEY is not set".into())
            })?;
            Arc::new(OpenAiGenerationClient::new(
                &config.openai_base_url,
                api_key,
                timeout,
            )?)
        }
    };
    Ok(client)
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, GenerationClientError> {
    reqwest::Client::builder()
        .user_agent("rusty-rag/chat")
        .timeout(timeout)
        .build()
        .map_err(|error| GenerationClientError::ProviderUnavailable(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn ollama_provider_builds_without_credentials() {
        assert!(build_generation_client(&test_config()).is_ok());
    }

    #[test]
    fn openai_provider_requires_api_key() {
        let mut config = test_config();
        config.generation_provider = GenerationProvider::OpenAI;
        let Err(error) = build_generation_client(&config) else {
            panic!("missing key should fail");
        };
        assert!(matches!(error, GenerationClientError::ProviderUnavailable(_)));

        config.llm_api_key = Some("sk-test".into());
        assert!(build_generation_client(&config).is_ok());
    }

    #[test]
    fn message_constructors_set_roles() {
        assert_eq!(ChatMessage::system("s").role, ChatRole::System);
        assert_eq!(ChatMessage::user("u").role, ChatRole::User);
        assert_eq!(ChatMessage::assistant("a").content, "a");
    }
}
