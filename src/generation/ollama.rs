use super::{GenerationClient, GenerationClientError, GenerationRequest, http_client};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Chat client for a local Ollama runtime (`POST /api/chat`, non-streaming).
pub struct OllamaGenerationClient {
    http: Client,
    base_url: String,
}

impl OllamaGenerationClient {
    /// Build a client targeting `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GenerationClientError> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    done: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

#[async_trait]
impl GenerationClient for OllamaGenerationClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError> {
        let payload = json!({
            "model": request.model,
            "messages": request.messages,
            "stream": false,
            "options": {
                "temperature": request.temperature,
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GenerationClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404 (is model '{}' pulled?)",
                self.endpoint(),
                request.model
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaChatResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(GenerationClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.message.content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::ChatMessage;
    use httpmock::{Method::POST, MockServer};

    fn request() -> GenerationRequest {
        GenerationRequest {
            model: "llama".into(),
            messages: vec![
                ChatMessage::system("Answer from context."),
                ChatMessage::user("What is in the report?"),
            ],
            temperature: 0.7,
        }
    }

    #[tokio::test]
    async fn ollama_client_handles_successful_response() {
        let server = MockServer::start_async().await;
        let client =
            OllamaGenerationClient::new(&server.base_url(), Duration::from_secs(5)).expect("client");

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/chat")
                    .json_body_partial(r#"{"model":"llama","stream":false}"#);
                then.status(200).json_body(json!({
                    "model": "llama",
                    "message": { "role": "assistant", "content": "  Quarterly numbers.  " },
                    "done": true
                }));
            })
            .await;

        let answer = client.generate(request()).await.expect("answer");

        mock.assert();
        assert_eq!(answer, "Quarterly numbers.");
    }

    #[tokio::test]
    async fn ollama_client_handles_error_status() {
        let server = MockServer::start_async().await;
        let client =
            OllamaGenerationClient::new(&server.base_url(), Duration::from_secs(5)).expect("client");

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(500).body("boom");
            })
            .await;

        let error = client.generate(request()).await.expect_err("error response");

        assert!(
            matches!(error, GenerationClientError::GenerationFailed(ref message) if message.contains("500"))
        );
    }

    #[tokio::test]
    async fn incomplete_response_is_rejected() {
        let server = MockServer::start_async().await;
        let client =
            OllamaGenerationClient::new(&server.base_url(), Duration::from_secs(5)).expect("client");

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(200).json_body(json!({
                    "message": { "role": "assistant", "content": "partial" },
                    "done": false
                }));
            })
            .await;

        let error = client.generate(request()).await.expect_err("incomplete");
        assert!(matches!(error, GenerationClientError::InvalidResponse(_)));
    }
}
