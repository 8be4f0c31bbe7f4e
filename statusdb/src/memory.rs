use crate::document::{Document, Value};
use crate::errors::{Result, StoreError};
use crate::models::{DocumentId, Revision, StoredDocument};
use crate::store::DocumentStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

struct Entry {
    generation: u64,
    revision: Revision,
    body: Document,
}

/// In-process document store with CouchDB-style revisions.
///
/// Every successful write bumps the generation and issues a fresh
/// revision, so stale writers get a `Conflict` just like against a real
/// server. Read and write counters are exposed for tests.
pub struct MemoryStore {
    name: String,
    docs: RwLock<BTreeMap<DocumentId, Entry>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docs: RwLock::new(BTreeMap::new()),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    fn next_revision(generation: u64) -> Revision {
        Revision::new(format!("{}-{}", generation, Uuid::new_v4().simple()))
    }

    /// Creates or overwrites a document without a revision check.
    pub async fn insert(&self, id: impl Into<String>, body: Document) -> Revision {
        let id = DocumentId::new(id);
        let mut docs = self.docs.write().await;
        let generation = docs.get(&id).map(|e| e.generation + 1).unwrap_or(1);
        let revision = Self::next_revision(generation);
        docs.insert(
            id,
            Entry {
                generation,
                revision: revision.clone(),
                body,
            },
        );
        revision
    }

    /// Current content of a document, without counting as a read.
    pub async fn snapshot(&self, id: &str) -> Option<Document> {
        let docs = self.docs.read().await;
        docs.get(&DocumentId::new(id)).map(|e| e.body.clone())
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_by_id(&self, id: &DocumentId) -> Result<Option<StoredDocument>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let docs = self.docs.read().await;
        Ok(docs.get(id).map(|entry| StoredDocument {
            id: id.clone(),
            revision: entry.revision.clone(),
            body: entry.body.clone(),
        }))
    }

    async fn all_ids(&self) -> Result<Vec<DocumentId>> {
        let docs = self.docs.read().await;
        Ok(docs.keys().cloned().collect())
    }

    async fn write(
        &self,
        id: &DocumentId,
        body: &Document,
        revision: &Revision,
    ) -> Result<Revision> {
        let mut docs = self.docs.write().await;
        let entry = docs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", self.name, id)))?;
        if &entry.revision != revision {
            return Err(StoreError::Conflict(format!(
                "{}/{}: expected revision {}, stored revision is {}",
                self.name, id, revision, entry.revision
            )));
        }
        entry.generation += 1;
        entry.revision = Self::next_revision(entry.generation);
        entry.body = body.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(entry.revision.clone())
    }

    async fn find_by_field(&self, field: &str, value: &str) -> Result<Vec<DocumentId>> {
        let docs = self.docs.read().await;
        Ok(docs
            .iter()
            .filter(|(_, entry)| matches!(entry.body.get(field), Some(Value::String(s)) if s == value))
            .map(|(id, _)| id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(raw: serde_json::Value) -> Document {
        Document::try_from(raw).unwrap()
    }

    #[tokio::test]
    async fn test_write_with_stale_revision_conflicts() {
        let store = MemoryStore::new("flowcells");
        let first = store.insert("fc1", doc(json!({"name": "AFC1"}))).await;
        let id = DocumentId::new("fc1");

        let second = store
            .write(&id, &doc(json!({"name": "AFC1", "x": 1})), &first)
            .await
            .unwrap();
        assert_ne!(first, second);

        let err = store
            .write(&id, &doc(json!({"name": "AFC1", "x": 2})), &first)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.writes(), 1);
        assert_eq!(store.snapshot("fc1").await, Some(doc(json!({"name": "AFC1", "x": 1}))));
    }

    #[tokio::test]
    async fn test_write_to_missing_document_is_not_found() {
        let store = MemoryStore::new("flowcells");
        let err = store
            .write(&DocumentId::new("nope"), &Document::new(), &Revision::new("1-a"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_find_by_field_matches_top_level_strings_only() {
        let store = MemoryStore::new("projects");
        store.insert("p1", doc(json!({"project_name": "J.Doe_13_01"}))).await;
        store.insert("p2", doc(json!({"project_name": "J.Doe_13_02"}))).await;
        store
            .insert("p3", doc(json!({"nested": {"project_name": "J.Doe_13_01"}})))
            .await;

        let ids = store.find_by_field("project_name", "J.Doe_13_01").await.unwrap();
        assert_eq!(ids, vec![DocumentId::new("p1")]);
        assert_eq!(store.all_ids().await.unwrap().len(), 3);
    }
}
