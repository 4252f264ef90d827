//! Prompt assembly for retrieval-augmented answers.

use crate::conversation::{Exchange, SourceCitation};
use crate::generation::ChatMessage;
use crate::index::ChunkHit;
use std::collections::HashSet;
use uuid::Uuid;

const ANSWER_INSTRUCTIONS: &str = "You are a document assistant. Answer the user's question using only the numbered context excerpts below and the prior conversation. If the excerpts do not contain the answer, say that the uploaded documents do not cover it. Refer to excerpts by their number, e.g. [1].";

const CONDENSE_INSTRUCTIONS: &str = "Given the conversation so far and a follow-up question, rephrase the follow-up question so that it can be understood without the conversation. Return only the rephrased question.";

/// Build the transcript sent to the generation provider.
///
/// Layout: one system message carrying instructions and the retrieved excerpts, the full
/// conversation history as alternating user/assistant turns, then the new question.
pub(crate) fn build_answer_messages(
    question: &str,
    hits: &[ChunkHit],
    history: &[Exchange],
) -> Vec<ChatMessage> {
    let mut system = String::from(ANSWER_INSTRUCTIONS);
    system.push_str("\n\nContext:\n");
    for (position, hit) in hits.iter().enumerate() {
        system.push_str(&format!(
            "[{}] {} (chunk {})\n{}\n\n",
            position + 1,
            hit.filename,
            hit.chunk_index,
            hit.text.trim()
        ));
    }

    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(ChatMessage::system(system.trim_end()));
    for exchange in history {
        messages.push(ChatMessage::user(exchange.question.clone()));
        messages.push(ChatMessage::assistant(exchange.answer.clone()));
    }
    messages.push(ChatMessage::user(question));
    messages
}

/// Build the transcript asking the model to turn a follow-up into a standalone question.
pub(crate) fn build_condense_messages(question: &str, history: &[Exchange]) -> Vec<ChatMessage> {
    let mut transcript = String::from("Conversation:\n");
    for exchange in history {
        transcript.push_str(&format!(
            "User: {}\nAssistant: {}\n",
            exchange.question.trim(),
            exchange.answer.trim()
        ));
    }
    transcript.push_str(&format!(
        "\nFollow-up question: {}\nStandalone question:",
        question.trim()
    ));

    vec![
        ChatMessage::system(CONDENSE_INSTRUCTIONS),
        ChatMessage::user(transcript),
    ]
}

/// Citations for the retrieved chunks, best first, one per (document, chunk).
pub(crate) fn citations_from_hits(hits: &[ChunkHit]) -> Vec<SourceCitation> {
    let mut seen: HashSet<(Option<Uuid>, &str, usize)> = HashSet::new();
    hits.iter()
        .filter(|hit| seen.insert((hit.document_id, hit.filename.as_str(), hit.chunk_index)))
        .map(|hit| SourceCitation {
            document_id: hit.document_id,
            filename: hit.filename.clone(),
            chunk_index: hit.chunk_index,
            score: hit.score,
        })
        .collect()
}
