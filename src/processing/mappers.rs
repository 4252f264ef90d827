//! Chunk preparation helpers.

use crate::{index::ChunkRecord, qdrant::compute_chunk_hash};
use std::collections::HashSet;
use uuid::Uuid;

/// Chunk text with associated hash ready for embedding.
#[derive(Debug, Clone)]
pub(crate) struct PreparedChunk {
    pub(crate) text: String,
    pub(crate) chunk_hash: String,
}

/// Remove duplicate chunks within a document, keeping the first occurrence.
pub(crate) fn dedupe_chunks(chunks: Vec<String>) -> (Vec<PreparedChunk>, usize) {
    let mut seen = HashSet::new();
    let mut prepared = Vec::new();
    let mut skipped = 0;

    for text in chunks {
        if text.trim().is_empty() {
            continue;
        }
        let hash = compute_chunk_hash(&text);
        if seen.insert(hash.clone()) {
            prepared.push(PreparedChunk {
                text,
                chunk_hash: hash,
            });
        } else {
            skipped += 1;
        }
    }

    (prepared, skipped)
}

/// Pair prepared chunks with their vectors, numbering them in document order.
pub(crate) fn to_records(
    document_id: Uuid,
    filename: &str,
    chunks: Vec<PreparedChunk>,
    vectors: Vec<Vec<f32>>,
) -> Vec<ChunkRecord> {
    chunks
        .into_iter()
        .zip(vectors)
        .enumerate()
        .map(|(chunk_index, (chunk, vector))| ChunkRecord {
            document_id,
            filename: filename.to_string(),
            chunk_index,
            text: chunk.text,
            chunk_hash: chunk.chunk_hash,
            vector,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let (prepared, skipped) = dedupe_chunks(vec![
            "alpha".into(),
            "beta".into(),
            "alpha".into(),
            "   ".into(),
        ]);
        assert_eq!(skipped, 1);
        let texts: Vec<_> = prepared.iter().map(|chunk| chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha", "beta"]);
    }

    #[test]
    fn records_are_numbered_in_order() {
        let (prepared, _) = dedupe_chunks(vec!["one".into(), "two".into()]);
        let id = Uuid::new_v4();
        let records = to_records(id, "a.txt", prepared, vec![vec![1.0], vec![2.0]]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].chunk_index, 1);
        assert_eq!(records[1].text, "two");
        assert_eq!(records[1].vector, vec![2.0]);
        assert!(records.iter().all(|record| record.document_id == id));
    }
}
