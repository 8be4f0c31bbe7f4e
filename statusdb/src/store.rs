use crate::document::Document;
use crate::errors::Result;
use crate::models::{DocumentId, Revision, StoredDocument};
use async_trait::async_trait;

/// The operations the reconciliation engine needs from a document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Name of the database, used in log lines.
    fn name(&self) -> &str;

    /// Reads a document and the revision it is currently at.
    async fn get_by_id(&self, id: &DocumentId) -> Result<Option<StoredDocument>>;

    /// Lists the ids of all regular (non-design) documents.
    async fn all_ids(&self) -> Result<Vec<DocumentId>>;

    /// Writes `body` as the new content of `id`, provided the stored
    /// revision still equals `revision`. Returns the new revision, or
    /// `StoreError::Conflict` when the document moved on in the meantime.
    async fn write(&self, id: &DocumentId, body: &Document, revision: &Revision)
        -> Result<Revision>;

    /// Ids of all documents whose top-level `field` equals `value`.
    async fn find_by_field(&self, field: &str, value: &str) -> Result<Vec<DocumentId>>;

    /// Every document id paired with its top-level string `field`, if any.
    ///
    /// The default reads each document in turn; stores with a query
    /// interface should override it.
    async fn field_index(&self, field: &str) -> Result<Vec<(DocumentId, Option<String>)>> {
        let mut index = Vec::new();
        for id in self.all_ids().await? {
            let value = self
                .get_by_id(&id)
                .await?
                .and_then(|stored| stored.body.get_str(field).map(str::to_string));
            index.push((id, value));
        }
        Ok(index)
    }
}
