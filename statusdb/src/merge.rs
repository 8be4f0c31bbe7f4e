use crate::document::{Document, KeyPath, Value};
use crate::errors::{Result, StoreError};
use crate::models::{DocumentId, Revision};
use crate::store::DocumentStore;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// The sub-tree was replaced and written at `revision`.
    Updated { revision: Revision },
    /// The stored sub-tree already equals the new one; nothing was written.
    Unchanged,
}

/// Replaces one named sub-tree of a stored document and writes the
/// document back under the revision it was read at.
pub struct MergeUpdater {
    store: Arc<dyn DocumentStore>,
}

impl MergeUpdater {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Reads `id` once, swaps the value at `path` for `subtree` (siblings
    /// are left as they are), and writes once if anything changed.
    ///
    /// Every key on the way to the last segment must already exist and
    /// hold a document. A concurrent modification surfaces as
    /// `StoreError::Conflict`; retrying is up to the caller.
    pub async fn merge_subtree(
        &self,
        id: &DocumentId,
        path: &KeyPath,
        subtree: Document,
    ) -> Result<MergeOutcome> {
        let (last, parents) = path
            .segments()
            .split_last()
            .ok_or_else(|| StoreError::InvalidPath("cannot replace the document root".into()))?;

        let mut stored = self
            .store
            .get_by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", self.store.name(), id)))?;

        let mut cursor = &mut stored.body;
        for segment in parents {
            cursor = match cursor.get_mut(segment) {
                Some(Value::Document(child)) => child,
                Some(_) => {
                    return Err(StoreError::InvalidPath(format!(
                        "'{segment}' in {path} of {id} is not a document"
                    )))
                }
                None => {
                    return Err(StoreError::InvalidPath(format!(
                        "'{segment}' in {path} is missing from {id}"
                    )))
                }
            };
        }

        let replacement = Value::Document(subtree);
        if cursor.get(last) == Some(&replacement) {
            log::debug!("{}/{}: {} already up to date", self.store.name(), id, path);
            return Ok(MergeOutcome::Unchanged);
        }
        cursor.insert(last.clone(), replacement);

        let revision = self
            .store
            .write(id, &stored.body, &stored.revision)
            .await?;
        Ok(MergeOutcome::Updated { revision })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::models::StoredDocument;
    use async_trait::async_trait;
    use serde_json::json;

    /// Another writer touches the document right after every read.
    struct RacingStore {
        inner: Arc<MemoryStore>,
    }

    #[async_trait]
    impl DocumentStore for RacingStore {
        fn name(&self) -> &str {
            self.inner.name()
        }

        async fn get_by_id(&self, id: &DocumentId) -> Result<Option<StoredDocument>> {
            let stored = self.inner.get_by_id(id).await?;
            if let Some(current) = &stored {
                let mut body = current.body.clone();
                body.insert("touched_by", "lims2db");
                self.inner.write(id, &body, &current.revision).await?;
            }
            Ok(stored)
        }

        async fn all_ids(&self) -> Result<Vec<DocumentId>> {
            self.inner.all_ids().await
        }

        async fn write(
            &self,
            id: &DocumentId,
            body: &Document,
            revision: &Revision,
        ) -> Result<Revision> {
            self.inner.write(id, body, revision).await
        }

        async fn find_by_field(&self, field: &str, value: &str) -> Result<Vec<DocumentId>> {
            self.inner.find_by_field(field, value).await
        }
    }

    fn doc(raw: serde_json::Value) -> Document {
        Document::try_from(raw).unwrap()
    }

    fn run_summary_path() -> KeyPath {
        KeyPath::parse("illumina.run_summary").unwrap()
    }

    async fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new("flowcells"));
        store
            .insert(
                "fc1",
                doc(json!({
                    "name": "AAD1TAPACXX",
                    "RunInfo": {"Id": "130611_SN7001298_0148_AAD1TAPACXX"},
                    "illumina": {
                        "run_summary": {"cycles": 101},
                        "Demultiplex_Stats": {"lanes": 8}
                    }
                })),
            )
            .await;
        store
    }

    #[tokio::test]
    async fn test_replaces_only_named_subtree() {
        let store = seeded().await;
        let before = store.snapshot("fc1").await.unwrap();
        let updater = MergeUpdater::new(store.clone());

        let outcome = updater
            .merge_subtree(
                &DocumentId::new("fc1"),
                &run_summary_path(),
                doc(json!({"cycles": 151, "chemistry": "v4"})),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, MergeOutcome::Updated { .. }));

        let after = store.snapshot("fc1").await.unwrap();
        assert_eq!(after.get("name"), before.get("name"));
        assert_eq!(after.get("RunInfo"), before.get("RunInfo"));
        assert_eq!(
            after.get_path(&KeyPath::parse("illumina.Demultiplex_Stats").unwrap()),
            before.get_path(&KeyPath::parse("illumina.Demultiplex_Stats").unwrap())
        );
        // replaced wholesale, not deep-merged
        assert_eq!(
            after.get_path(&run_summary_path()),
            Some(&Value::Document(doc(json!({"cycles": 151, "chemistry": "v4"}))))
        );
        assert_eq!(store.reads(), 1);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_identical_subtree_is_not_written() {
        let store = seeded().await;
        let updater = MergeUpdater::new(store.clone());

        let outcome = updater
            .merge_subtree(
                &DocumentId::new("fc1"),
                &run_summary_path(),
                doc(json!({"cycles": 101})),
            )
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Unchanged);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_missing_document_is_not_found() {
        let store = Arc::new(MemoryStore::new("flowcells"));
        let updater = MergeUpdater::new(store);
        let err = updater
            .merge_subtree(&DocumentId::new("nope"), &run_summary_path(), Document::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_parent_is_invalid_path() {
        let store = Arc::new(MemoryStore::new("flowcells"));
        store.insert("fc2", doc(json!({"name": "BXYZ"}))).await;
        let updater = MergeUpdater::new(store.clone());

        let err = updater
            .merge_subtree(&DocumentId::new("fc2"), &run_summary_path(), Document::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath(_)));
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_top_level_subtree_can_be_created() {
        let store = Arc::new(MemoryStore::new("flowcells"));
        store.insert("fc3", doc(json!({"name": "CXYZ"}))).await;
        let updater = MergeUpdater::new(store.clone());

        updater
            .merge_subtree(
                &DocumentId::new("fc3"),
                &KeyPath::parse("lims").unwrap(),
                doc(json!({"run_mode": "High Output"})),
            )
            .await
            .unwrap();
        let after = store.snapshot("fc3").await.unwrap();
        assert_eq!(after.get_str("name"), Some("CXYZ"));
        assert!(after.get("lims").unwrap().is_document());
    }

    #[tokio::test]
    async fn test_concurrent_modification_is_a_conflict() {
        let inner = seeded().await;
        let updater = MergeUpdater::new(Arc::new(RacingStore {
            inner: inner.clone(),
        }));

        let err = updater
            .merge_subtree(
                &DocumentId::new("fc1"),
                &run_summary_path(),
                doc(json!({"cycles": 151})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)), "got {err:?}");

        // only the racing write landed
        assert_eq!(inner.writes(), 1);
        let after = inner.snapshot("fc1").await.unwrap();
        assert_eq!(after.get_str("touched_by"), Some("lims2db"));
        assert_eq!(
            after.get_path(&run_summary_path()),
            Some(&Value::Document(doc(json!({"cycles": 101}))))
        );
    }
}
