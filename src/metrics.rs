use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion and chat activity.
#[derive(Default)]
pub struct AssistantMetrics {
    documents_indexed: AtomicU64,
    documents_failed: AtomicU64,
    chunks_indexed: AtomicU64,
    chat_answers: AtomicU64,
    chat_failures: AtomicU64,
}

impl AssistantMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an indexed document and the number of chunks produced for it.
    pub fn record_document(&self, chunk_count: u64) {
        self.documents_indexed.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed
            .fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record a file that was rejected or failed somewhere in the pipeline.
    pub fn record_failed_document(&self) {
        self.documents_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed chat exchange.
    pub fn record_answer(&self) {
        self.chat_answers.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a chat call that returned an error.
    pub fn record_chat_failure(&self) {
        self.chat_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_indexed: self.documents_indexed.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            chat_answers: self.chat_answers.load(Ordering::Relaxed),
            chat_failures: self.chat_failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of the counters used for reporting.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents indexed since startup.
    pub documents_indexed: u64,
    /// Number of uploaded files that ended in a failure status.
    pub documents_failed: u64,
    /// Total chunk count produced across all indexed documents.
    pub chunks_indexed: u64,
    /// Number of answered questions.
    pub chat_answers: u64,
    /// Number of chat calls that failed.
    pub chat_failures: u64,
}
