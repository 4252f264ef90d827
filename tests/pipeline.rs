use async_trait::async_trait;
use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use rustyrag::{
    api::create_router,
    chat::{ChatError, ChatSettings},
    config::ChunkUnit,
    embedding::HashEmbeddingClient,
    generation::{ChatRole, GenerationClient, GenerationClientError, GenerationRequest},
    index::{ChunkHit, ChunkRecord, IndexError, VectorIndex},
    processing::{FailureKind, FileStatus, IngestSettings, UploadedFile},
    report::ReportFormat,
    service::{Assistant, AssistantApi},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tower::ServiceExt;

const DIMENSION: usize = 64;

/// Brute-force cosine index kept in memory.
#[derive(Default)]
struct MemoryIndex {
    records: Mutex<Vec<ChunkRecord>>,
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_ready(&self) -> Result<(), IndexError> {
        Ok(())
    }

    async fn upsert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<usize, IndexError> {
        let count = chunks.len();
        self.records.lock().await.extend(chunks);
        Ok(count)
    }

    async fn search(&self, vector: Vec<f32>, limit: usize) -> Result<Vec<ChunkHit>, IndexError> {
        let records = self.records.lock().await;
        let mut hits: Vec<ChunkHit> = records
            .iter()
            .map(|record| ChunkHit {
                id: format!("{}-{}", record.document_id, record.chunk_index),
                score: cosine(&vector, &record.vector),
                document_id: Some(record.document_id),
                filename: record.filename.clone(),
                chunk_index: record.chunk_index,
                text: record.text.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self) -> Result<u64, IndexError> {
        Ok(self.records.lock().await.len() as u64)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Answers by echoing the latest user turn, yielding first so concurrent calls interleave.
struct EchoGenerator;

#[async_trait]
impl GenerationClient for EchoGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError> {
        tokio::task::yield_now().await;
        let question = request
            .messages
            .iter()
            .rev()
            .find(|message| message.role == ChatRole::User)
            .map(|message| message.content.clone())
            .unwrap_or_default();
        Ok(format!("Answer to: {question}"))
    }
}

struct Harness {
    assistant: Arc<Assistant>,
    _uploads: TempDir,
}

fn harness() -> Harness {
    let uploads = tempfile::tempdir().expect("tempdir");
    let ingest = IngestSettings {
        chunk_size: 120,
        chunk_overlap: 20,
        chunk_unit: ChunkUnit::Chars,
        concurrency: 4,
        upload_dir: uploads.path().to_path_buf(),
        extract_cache_dir: None,
    };
    let chat = ChatSettings {
        model: "test-model".into(),
        temperature: 0.2,
        top_k: 3,
        condense_follow_ups: false,
    };
    let assistant = Assistant::new(
        Arc::new(HashEmbeddingClient::new(DIMENSION)),
        Arc::new(EchoGenerator),
        Arc::new(MemoryIndex::default()),
        ingest,
        chat,
    );
    Harness {
        assistant: Arc::new(assistant),
        _uploads: uploads,
    }
}

fn txt(name: &str, body: &str) -> UploadedFile {
    UploadedFile::new(name, body.as_bytes().to_vec())
}

fn sample_files() -> Vec<UploadedFile> {
    vec![
        txt(
            "revenue.txt",
            "Quarterly revenue grew twelve percent in the northern region while costs stayed flat.",
        ),
        UploadedFile::new(
            "memo.rtf",
            br"{\rtf1\ansi The board approved the new budget.\par Hiring resumes in spring.}".to_vec(),
        ),
        txt(
            "notes.txt",
            "Team offsite is planned for October. Agenda covers roadmap and hiring.",
        ),
    ]
}

#[tokio::test]
async fn upload_reports_one_status_per_file_in_order() {
    let harness = harness();
    let mut files = sample_files();
    files.insert(1, txt("script.exe", "MZ"));

    let reports = harness.assistant.upload(files).await;

    let names: Vec<_> = reports.iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(names, vec!["revenue.txt", "script.exe", "memo.rtf", "notes.txt"]);
    assert_eq!(reports[1].status, FileStatus::Failed);
    assert_eq!(reports[1].error_kind, Some(FailureKind::UnsupportedFormat));
    assert!(reports[1].document_id.is_none());
    for index in [0, 2, 3] {
        assert!(reports[index].is_indexed(), "{:?}", reports[index]);
        assert!(reports[index].chunks.unwrap_or_default() >= 1);
    }
}

#[tokio::test]
async fn corrupt_docx_fails_without_affecting_the_batch() {
    let harness = harness();
    let mut files = sample_files();
    files.push(UploadedFile::new("broken.docx", b"definitely not a zip".to_vec()));

    let reports = harness.assistant.upload(files).await;

    assert_eq!(reports.len(), 4);
    assert_eq!(reports.iter().filter(|r| r.is_indexed()).count(), 3);
    let broken = &reports[3];
    assert_eq!(broken.status, FileStatus::Failed);
    assert_eq!(broken.error_kind, Some(FailureKind::ExtractionFailed));
    assert!(broken.document_id.is_some());

    let documents = harness.assistant.documents().await;
    assert_eq!(documents.len(), 4);
    assert_eq!(harness.assistant.health().await.documents_indexed, 3);
}

#[tokio::test]
async fn chat_before_any_upload_is_retrieval_unavailable() {
    let harness = harness();
    let error = harness
        .assistant
        .chat("What is the revenue?")
        .await
        .expect_err("empty index");
    assert!(matches!(error, ChatError::RetrievalUnavailable));
    assert!(harness.assistant.history().await.is_empty());
}

#[tokio::test]
async fn chat_answers_with_sources_and_records_the_exchange() {
    let harness = harness();
    harness.assistant.upload(sample_files()).await;

    let answer = harness
        .assistant
        .chat("How did quarterly revenue change?")
        .await
        .expect("answer");

    assert_eq!(answer.answer, "Answer to: How did quarterly revenue change?");
    assert!(!answer.sources.is_empty());
    assert!(answer.sources.len() <= 3);

    let history = harness.assistant.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, answer.exchange_id);
    assert_eq!(history[0].sources, answer.sources);
}

#[tokio::test]
async fn concurrent_chats_record_distinct_intact_exchanges() {
    let harness = harness();
    harness.assistant.upload(sample_files()).await;

    let first = harness.assistant.clone();
    let second = harness.assistant.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { first.chat("What did the board approve?").await }),
        tokio::spawn(async move { second.chat("When is the offsite?").await }),
    );
    let a = a.expect("join").expect("answer");
    let b = b.expect("join").expect("answer");
    assert_ne!(a.exchange_id, b.exchange_id);

    let history = harness.assistant.history().await;
    assert_eq!(history.len(), 2);
    for exchange in &history {
        assert_eq!(exchange.answer, format!("Answer to: {}", exchange.question));
    }
}

#[tokio::test]
async fn report_has_one_section_per_exchange() {
    let harness = harness();
    harness.assistant.upload(sample_files()).await;
    for question in ["First question?", "Second question?", "Third question?"] {
        harness.assistant.chat(question).await.expect("answer");
    }

    let bytes = harness
        .assistant
        .report(ReportFormat::Text)
        .await
        .expect("report");
    let text = String::from_utf8(bytes).expect("utf-8 report");
    assert!(text.contains("Exchanges: 3\n"));
    assert_eq!(text.matches("== Exchange ").count(), 3);
    assert!(text.contains("Question: Second question?"));

    let pdf = harness
        .assistant
        .report(ReportFormat::Pdf)
        .await
        .expect("pdf report");
    assert!(pdf.starts_with(b"%PDF"));
}

#[tokio::test]
async fn clear_empties_the_conversation_but_keeps_documents() {
    let harness = harness();
    harness.assistant.upload(sample_files()).await;
    harness.assistant.chat("Who approved the budget?").await.expect("answer");

    harness.assistant.clear().await;

    let text = String::from_utf8(
        harness
            .assistant
            .report(ReportFormat::Text)
            .await
            .expect("report"),
    )
    .expect("utf-8 report");
    assert!(text.contains("Exchanges: 0"));
    assert!(text.contains("No exchanges recorded."));

    let answer = harness
        .assistant
        .chat("Is hiring resuming?")
        .await
        .expect("documents still indexed");
    assert!(!answer.sources.is_empty());
    assert_eq!(harness.assistant.history().await.len(), 1);
}

#[tokio::test]
async fn http_round_trip_through_router() {
    let harness = harness();
    let app = create_router(harness.assistant.clone(), 1024 * 1024);

    let boundary = "pipelineboundary";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"revenue.txt\"\r\nContent-Type: text/plain\r\n\r\nRevenue grew twelve percent this quarter.\r\n--{boundary}--\r\n"
    );
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/upload")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("upload response");
    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["results"][0]["status"], "indexed");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/chat")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "question": "How much did revenue grow?" }).to_string()))
                .expect("request"),
        )
        .await
        .expect("chat response");
    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["sources"][0]["filename"], "revenue.txt");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("health response");
    let json = read_json(response).await;
    assert_eq!(json["exchanges"], 1);
    assert_eq!(json["documents_indexed"], 1);
    assert_eq!(json["index"]["reachable"], true);
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}
