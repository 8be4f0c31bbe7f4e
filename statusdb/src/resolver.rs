use crate::errors::{Result, StoreError};
use crate::models::{BusinessKey, DocumentId};
use crate::store::DocumentStore;
use async_trait::async_trait;
use std::sync::Arc;

/// Maps a business key to the internal id of the one document it names.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Returns the matching id, `StoreError::NotFound` when nothing
    /// matches, or `StoreError::AmbiguousKey` when more than one does.
    async fn resolve(&self, key: &BusinessKey) -> Result<DocumentId>;
}

/// Resolves keys by looking them up in an indexed document field, e.g.
/// `name` in the flowcell database or `project_name` in the project one.
pub struct ViewResolver {
    store: Arc<dyn DocumentStore>,
    field: String,
}

impl ViewResolver {
    pub fn new(store: Arc<dyn DocumentStore>, field: impl Into<String>) -> Self {
        Self {
            store,
            field: field.into(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

#[async_trait]
impl KeyResolver for ViewResolver {
    async fn resolve(&self, key: &BusinessKey) -> Result<DocumentId> {
        let mut matches = self.store.find_by_field(&self.field, key.as_str()).await?;
        match matches.len() {
            0 => Err(StoreError::NotFound(format!(
                "no document in {} with {} = '{}'",
                self.store.name(),
                self.field,
                key
            ))),
            1 => Ok(matches.remove(0)),
            n => {
                log::warn!(
                    "{} documents in {} share {} = '{}': {:?}",
                    n,
                    self.store.name(),
                    self.field,
                    key,
                    matches
                );
                Err(StoreError::AmbiguousKey {
                    key: key.to_string(),
                    matches: n,
                })
            }
        }
    }
}

/// Treats the key as the document id itself. Used when candidates were
/// enumerated from the store's own id listing.
pub struct DirectIdResolver;

#[async_trait]
impl KeyResolver for DirectIdResolver {
    async fn resolve(&self, key: &BusinessKey) -> Result<DocumentId> {
        Ok(DocumentId::new(key.as_str()))
    }
}
