//! Helpers for constructing, hashing and reading Qdrant payloads.

use crate::index::{ChunkHit, ChunkRecord};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Build the payload object stored alongside each indexed chunk.
pub(crate) fn build_payload(record: &ChunkRecord, timestamp_rfc3339: &str) -> Value {
    let mut payload = Map::new();
    payload.insert(
        "document_id".into(),
        Value::String(record.document_id.to_string()),
    );
    payload.insert("filename".into(), Value::String(record.filename.clone()));
    payload.insert("chunk_index".into(), Value::from(record.chunk_index));
    payload.insert(
        "chunk_hash".into(),
        Value::String(record.chunk_hash.clone()),
    );
    payload.insert(
        "indexed_at".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    payload.insert("text".into(), Value::String(record.text.clone()));
    Value::Object(payload)
}

/// Turn a scored point back into a citation-ready hit.
pub(crate) fn hit_from_payload(
    id: String,
    score: f32,
    payload: Option<Map<String, Value>>,
) -> ChunkHit {
    let mut map = payload.unwrap_or_default();
    let text = match map.remove("text") {
        Some(Value::String(value)) => value,
        _ => String::new(),
    };
    let filename = match map.remove("filename") {
        Some(Value::String(value)) if !value.trim().is_empty() => value,
        _ => "unknown".to_string(),
    };
    let document_id = match map.remove("document_id") {
        Some(Value::String(value)) => Uuid::parse_str(&value).ok(),
        _ => None,
    };
    let chunk_index = map
        .get("chunk_index")
        .and_then(Value::as_u64)
        .unwrap_or_default() as usize;

    ChunkHit {
        id,
        score,
        document_id,
        filename,
        chunk_index,
        text,
    }
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Construct an identifier suitable for Qdrant points.
pub(crate) fn generate_point_id() -> String {
    Uuid::new_v4().to_string()
}
