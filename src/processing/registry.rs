//! In-memory registry of uploaded documents.

use super::types::{Document, DocumentStatus, DocumentSummary};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Documents in upload order. Entries are never removed.
#[derive(Default)]
pub struct DocumentRegistry {
    documents: RwLock<Vec<Document>>,
}

impl DocumentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a freshly uploaded document.
    pub async fn insert(&self, document: Document) {
        self.documents.write().await.push(document);
    }

    /// Apply `update` to the document with `id`, if present.
    pub async fn update<F>(&self, id: Uuid, update: F)
    where
        F: FnOnce(&mut Document),
    {
        let mut documents = self.documents.write().await;
        if let Some(document) = documents.iter_mut().find(|document| document.id == id) {
            update(document);
        }
    }

    /// Move the document into the failed state with a reason.
    pub async fn mark_failed(&self, id: Uuid, reason: String) {
        self.update(id, |document| {
            document.status = DocumentStatus::Failed;
            document.failure = Some(reason);
        })
        .await;
    }

    /// Clone of the document with `id`.
    pub async fn get(&self, id: Uuid) -> Option<Document> {
        self.documents
            .read()
            .await
            .iter()
            .find(|document| document.id == id)
            .cloned()
    }

    /// Summaries of every known document, in upload order.
    pub async fn summaries(&self) -> Vec<DocumentSummary> {
        self.documents
            .read()
            .await
            .iter()
            .map(Document::summary)
            .collect()
    }

    /// Number of documents that reached the indexed state.
    pub async fn indexed_count(&self) -> usize {
        self.documents
            .read()
            .await
            .iter()
            .filter(|document| document.status == DocumentStatus::Indexed)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::FileKind;

    #[tokio::test]
    async fn tracks_status_changes() {
        let registry = DocumentRegistry::new();
        let first = Document::new("a.txt", FileKind::Txt, b"a");
        let second = Document::new("b.pdf", FileKind::Pdf, b"b");
        let (first_id, second_id) = (first.id, second.id);
        registry.insert(first).await;
        registry.insert(second).await;

        registry
            .update(first_id, |document| {
                document.status = DocumentStatus::Indexed;
                document.chunk_count = 2;
            })
            .await;
        registry.mark_failed(second_id, "broken".into()).await;

        let summaries = registry.summaries().await;
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].filename, "a.txt");
        assert_eq!(summaries[0].status, DocumentStatus::Indexed);
        assert_eq!(summaries[1].status, DocumentStatus::Failed);
        assert_eq!(summaries[1].failure.as_deref(), Some("broken"));
        assert_eq!(registry.indexed_count().await, 1);
        assert_eq!(registry.get(first_id).await.unwrap().chunk_count, 2);
    }

    #[tokio::test]
    async fn unknown_id_is_ignored() {
        let registry = DocumentRegistry::new();
        registry.mark_failed(Uuid::new_v4(), "nope".into()).await;
        assert!(registry.summaries().await.is_empty());
    }
}
