//! HTTP surface for Rusty RAG.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /upload` – multipart file list; returns one status entry per file, in order.
//! - `POST /chat` – `{ "question": "..." }`; answers from indexed documents and records the
//!   exchange. `409` when nothing is indexed yet.
//! - `GET /report` – the conversation as a PDF attachment (`?format=text` for plain text).
//! - `POST /clear` – empty the conversation; indexed documents are kept.
//! - `GET /health` – liveness plus index reachability and counters.
//! - `GET /history` – the current exchanges.
//! - `GET /documents` – summaries of uploaded documents.
//! - `GET /commands` – machine-readable command catalog for quick discovery by tools/hosts.
//!
//! Errors are JSON bodies of the form `{ "error": "...", "kind": "..." }`.

use crate::{
    chat::{ChatAnswer, ChatError},
    conversation::Exchange,
    processing::{DocumentSummary, FileReport, UploadedFile},
    report::{ReportError, ReportFormat},
    service::{AssistantApi, HealthSnapshot},
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the HTTP router exposing the assistant.
pub fn create_router<S>(service: Arc<S>, max_upload_bytes: usize) -> Router
where
    S: AssistantApi + 'static,
{
    Router::new()
        .route("/upload", post(upload::<S>))
        .route("/chat", post(chat::<S>))
        .route("/report", get(report::<S>))
        .route("/clear", post(clear::<S>))
        .route("/health", get(health::<S>))
        .route("/history", get(history::<S>))
        .route("/documents", get(documents::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Response body for `POST /upload`.
#[derive(Serialize)]
struct UploadResponse {
    results: Vec<FileReport>,
}

/// Ingest every file part of a multipart body.
///
/// Parts without a file name are ignored; an upload without any file part is rejected.
async fn upload<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError>
where
    S: AssistantApi,
{
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(filename) = field.file_name().map(str::to_string) else {
            tracing::debug!(field = ?field.name(), "Skipping multipart field without file name");
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        files.push(UploadedFile {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    if files.is_empty() {
        return Err(AppError::BadRequest("no files were uploaded".into()));
    }

    let results = service.upload(files).await;
    let indexed = results.iter().filter(|report| report.is_indexed()).count();
    tracing::info!(
        files = results.len(),
        indexed,
        "Upload request completed"
    );
    Ok(Json(UploadResponse { results }))
}

/// Request body for `POST /chat`.
#[derive(Deserialize)]
struct ChatRequest {
    /// Question to answer; `message` is accepted as an alias.
    #[serde(alias = "message")]
    question: String,
}

/// Answer a question using retrieved document chunks and the conversation so far.
async fn chat<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatAnswer>, AppError>
where
    S: AssistantApi,
{
    let answer = service.chat(&request.question).await?;
    Ok(Json(answer))
}

/// Query string for `GET /report`.
#[derive(Deserialize)]
struct ReportQuery {
    #[serde(default)]
    format: Option<String>,
}

/// Download the conversation report.
async fn report<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, AppError>
where
    S: AssistantApi,
{
    let format = match query.format.as_deref() {
        None => ReportFormat::default(),
        Some(value) => value
            .parse()
            .map_err(|_| AppError::BadRequest(format!("unknown report format '{value}'")))?,
    };
    let bytes = service.report(format).await?;
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", format.file_name()),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Empty the conversation.
async fn clear<S>(State(service): State<Arc<S>>) -> Json<serde_json::Value>
where
    S: AssistantApi,
{
    service.clear().await;
    Json(json!({ "ok": true }))
}

async fn health<S>(State(service): State<Arc<S>>) -> Json<HealthSnapshot>
where
    S: AssistantApi,
{
    Json(service.health().await)
}

/// Response body for `GET /history`.
#[derive(Serialize)]
struct HistoryResponse {
    exchanges: Vec<Exchange>,
}

async fn history<S>(State(service): State<Arc<S>>) -> Json<HistoryResponse>
where
    S: AssistantApi,
{
    Json(HistoryResponse {
        exchanges: service.history().await,
    })
}

/// Response body for `GET /documents`.
#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<DocumentSummary>,
}

async fn documents<S>(State(service): State<Arc<S>>) -> Json<DocumentsResponse>
where
    S: AssistantApi,
{
    Json(DocumentsResponse {
        documents: service.documents().await,
    })
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload",
                method: "POST",
                path: "/upload",
                description: "Upload PDF, DOCX, RTF, TXT or PNG files as multipart form parts. Response returns { \"results\": [{ \"filename\", \"status\", \"error_kind\"?, \"error\"? }] } in upload order.",
                request_example: None,
            },
            CommandDescriptor {
                name: "chat",
                method: "POST",
                path: "/chat",
                description: "Ask a question about the uploaded documents. Response returns { \"answer\", \"sources\" }; 409 when nothing is indexed.",
                request_example: Some(json!({ "question": "What were the key findings?" })),
            },
            CommandDescriptor {
                name: "report",
                method: "GET",
                path: "/report",
                description: "Download the conversation as a PDF report; pass ?format=text for plain text.",
                request_example: None,
            },
            CommandDescriptor {
                name: "clear",
                method: "POST",
                path: "/clear",
                description: "Clear the conversation history. Indexed documents stay searchable.",
                request_example: None,
            },
            CommandDescriptor {
                name: "health",
                method: "GET",
                path: "/health",
                description: "Liveness, vector index reachability and activity counters.",
                request_example: None,
            },
            CommandDescriptor {
                name: "history",
                method: "GET",
                path: "/history",
                description: "Return the exchanges recorded since the last clear.",
                request_example: None,
            },
            CommandDescriptor {
                name: "documents",
                method: "GET",
                path: "/documents",
                description: "List uploaded documents with their processing status.",
                request_example: None,
            },
        ],
    })
}

enum AppError {
    BadRequest(String),
    Chat(ChatError),
    Report(ReportError),
}

impl AppError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Chat(ChatError::EmptyQuestion) => (StatusCode::BAD_REQUEST, "empty_question"),
            Self::Chat(ChatError::RetrievalUnavailable) => {
                (StatusCode::CONFLICT, "retrieval_unavailable")
            }
            Self::Chat(ChatError::Embedding(_)) => (StatusCode::BAD_GATEWAY, "embedding_failed"),
            Self::Chat(ChatError::Generation(_)) => {
                (StatusCode::BAD_GATEWAY, "generation_failed")
            }
            Self::Chat(ChatError::Index(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "index_unavailable")
            }
            Self::Report(_) => (StatusCode::INTERNAL_SERVER_ERROR, "report_failed"),
        }
    }

    fn message(&self) -> String {
        match self {
            Self::BadRequest(message) => message.clone(),
            Self::Chat(error) => error.to_string(),
            Self::Report(error) => error.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            tracing::error!(%status, kind, error = %self.message(), "Request failed");
        }
        (status, Json(json!({ "error": self.message(), "kind": kind }))).into_response()
    }
}

impl From<ChatError> for AppError {
    fn from(inner: ChatError) -> Self {
        Self::Chat(inner)
    }
}

impl From<ReportError> for AppError {
    fn from(inner: ReportError) -> Self {
        Self::Report(inner)
    }
}

impl From<MultipartError> for AppError {
    fn from(inner: MultipartError) -> Self {
        Self::BadRequest(format!("invalid multipart body: {}", inner.body_text()))
    }
}
