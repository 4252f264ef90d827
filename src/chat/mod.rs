//! Retrieval-augmented chat over indexed documents.

mod prompt;
mod service;

pub use service::{ChatAnswer, ChatError, ChatService, ChatSettings};
