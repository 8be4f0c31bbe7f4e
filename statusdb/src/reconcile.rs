//! What the batch driver does with a candidate once its document is known.

use crate::diff::{diff, DiffReport};
use crate::document::{Document, KeyPath};
use crate::errors::{Result, StoreError};
use crate::merge::{MergeOutcome, MergeUpdater};
use crate::models::DocumentId;
use crate::store::DocumentStore;
use crate::sync::SyncCandidate;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Updated,
    Unchanged,
    Compared(DiffReport),
    CounterpartMissing,
}

#[async_trait]
pub trait Reconcile<R: Send + Sync>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn reconcile(&self, id: &DocumentId, candidate: &SyncCandidate<R>)
        -> Result<ReconcileOutcome>;
}

/// Upload mode: derive a sub-tree from the source record and merge it into
/// the stored document.
pub struct SubtreeUpload<F> {
    updater: MergeUpdater,
    path: KeyPath,
    derive: F,
}

impl<F> SubtreeUpload<F> {
    pub fn new(updater: MergeUpdater, path: KeyPath, derive: F) -> Self {
        Self {
            updater,
            path,
            derive,
        }
    }
}

#[async_trait]
impl<R, F> Reconcile<R> for SubtreeUpload<F>
where
    R: Send + Sync,
    F: Fn(&R) -> Result<Document> + Send + Sync,
{
    fn name(&self) -> &'static str {
        "subtree_upload"
    }

    async fn reconcile(
        &self,
        id: &DocumentId,
        candidate: &SyncCandidate<R>,
    ) -> Result<ReconcileOutcome> {
        let subtree = (self.derive)(&candidate.record)?;
        let outcome = self.updater.merge_subtree(id, &self.path, subtree).await?;
        let key = candidate.key_label();
        match outcome {
            MergeOutcome::Updated { revision } => {
                log::info!(
                    "{} {} updated : _id = {} (rev {})",
                    self.updater.store().name(),
                    key,
                    id,
                    revision
                );
                Ok(ReconcileOutcome::Updated)
            }
            MergeOutcome::Unchanged => {
                log::info!(
                    "{} {} not updated : _id = {}",
                    self.updater.store().name(),
                    key,
                    id
                );
                Ok(ReconcileOutcome::Unchanged)
            }
        }
    }
}

/// Validation mode: read the same document from two environments and log
/// every divergence between them.
pub struct EnvironmentComparison {
    left: Arc<dyn DocumentStore>,
    right: Arc<dyn DocumentStore>,
    left_name: String,
    right_name: String,
}

impl EnvironmentComparison {
    pub fn new(
        left: Arc<dyn DocumentStore>,
        right: Arc<dyn DocumentStore>,
        left_name: impl Into<String>,
        right_name: impl Into<String>,
    ) -> Self {
        Self {
            left,
            right,
            left_name: left_name.into(),
            right_name: right_name.into(),
        }
    }
}

#[async_trait]
impl<R: Send + Sync> Reconcile<R> for EnvironmentComparison {
    fn name(&self) -> &'static str {
        "environment_comparison"
    }

    async fn reconcile(
        &self,
        id: &DocumentId,
        candidate: &SyncCandidate<R>,
    ) -> Result<ReconcileOutcome> {
        let key = candidate.key_label();
        log::info!("{} {} is being handled", self.left.name(), key);

        let left = self.left.get_by_id(id).await?.ok_or_else(|| {
            StoreError::NotFound(format!("{}/{} on {}", self.left.name(), id, self.left_name))
        })?;
        let Some(right) = self.right.get_by_id(id).await? else {
            log::warn!(
                "Found no document on {} for {} (_id = {})",
                self.right_name,
                key,
                id
            );
            return Ok(ReconcileOutcome::CounterpartMissing);
        };

        let report = diff(&left.body, &right.body);
        for line in report.describe(&self.left_name, &self.right_name) {
            log::info!("{}", line);
        }
        log::info!(
            "{} and {} are differing for {}: {}",
            self.left_name,
            self.right_name,
            key,
            report.differs()
        );
        Ok(ReconcileOutcome::Compared(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::models::BusinessKey;
    use serde_json::json;

    fn doc(raw: serde_json::Value) -> Document {
        Document::try_from(raw).unwrap()
    }

    fn candidate(key: &str) -> SyncCandidate<()> {
        SyncCandidate::new((), Some(BusinessKey::new(key)), None)
    }

    #[tokio::test]
    async fn test_comparison_reports_divergence() {
        let prod = Arc::new(MemoryStore::new("projects"));
        let dev = Arc::new(MemoryStore::new("projects"));
        prod.insert("p1", doc(json!({"project_name": "J.Doe_13_01", "status": "Ongoing"})))
            .await;
        dev.insert("p1", doc(json!({"project_name": "J.Doe_13_01", "status": "Aborted"})))
            .await;

        let action = EnvironmentComparison::new(prod, dev, "prod", "dev");
        let outcome = action
            .reconcile(&DocumentId::new("p1"), &candidate("J.Doe_13_01"))
            .await
            .unwrap();
        match outcome {
            ReconcileOutcome::Compared(report) => assert_eq!(report.len(), 1),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_comparison_without_counterpart() {
        let prod = Arc::new(MemoryStore::new("projects"));
        let dev = Arc::new(MemoryStore::new("projects"));
        prod.insert("p1", doc(json!({"project_name": "J.Doe_13_01"}))).await;

        let action = EnvironmentComparison::new(prod, dev, "prod", "dev");
        let outcome = action
            .reconcile(&DocumentId::new("p1"), &candidate("J.Doe_13_01"))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::CounterpartMissing);
    }

    #[tokio::test]
    async fn test_upload_propagates_derivation_errors() {
        let store = Arc::new(MemoryStore::new("flowcells"));
        store.insert("fc1", doc(json!({"name": "AFC1", "illumina": {}}))).await;
        let action = SubtreeUpload::new(
            MergeUpdater::new(store.clone()),
            KeyPath::parse("illumina.run_summary").unwrap(),
            |_: &()| -> Result<Document> { Err(StoreError::MalformedRecord("no UDFs".into())) },
        );

        let err = action
            .reconcile(&DocumentId::new("fc1"), &candidate("AFC1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MalformedRecord(_)));
        assert_eq!(store.reads(), 0);
    }
}
