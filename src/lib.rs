#![deny(missing_docs)]

//! Core library for the Rusty RAG document assistant.

/// HTTP routing and REST handlers.
pub mod api;
/// Retrieval-augmented question answering.
pub mod chat;
/// Environment-driven configuration management.
pub mod config;
/// Shared conversation log.
pub mod conversation;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Plain-text extraction for uploaded files.
pub mod extraction;
/// Chat completion client abstraction and adapters.
pub mod generation;
/// Vector index port used by ingestion and retrieval.
pub mod index;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion and chat counters.
pub mod metrics;
/// Document ingestion pipeline.
pub mod processing;
/// Qdrant vector store integration.
pub mod qdrant;
/// Conversation report compilation and rendering.
pub mod report;
/// Assistant facade wiring the pipeline together.
pub mod service;
