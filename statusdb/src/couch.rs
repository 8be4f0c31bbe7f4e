//! CouchDB HTTP client implementing [`DocumentStore`].

use crate::config::StatusDbConfig;
use crate::document::Document;
use crate::errors::{Result, StoreError};
use crate::models::{DocumentId, Revision, StoredDocument};
use crate::store::DocumentStore;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use url::Url;

const ID_FIELD: &str = "_id";
const REV_FIELD: &str = "_rev";
const INDEX_PAGE_SIZE: usize = 1000;

#[derive(Clone, Debug)]
struct Credentials {
    username: String,
    password: Option<String>,
}

/// Connection to one CouchDB server. Databases are opened with
/// [`CouchServer::database`] and share the underlying HTTP client.
#[derive(Clone, Debug)]
pub struct CouchServer {
    http: reqwest::Client,
    base_url: Url,
    credentials: Option<Credentials>,
}

impl CouchServer {
    pub fn new(config: &StatusDbConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| StoreError::Config(format!("invalid StatusDB url '{}': {e}", config.url)))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Config(format!(
                "StatusDB url '{}' cannot be used as a base",
                config.url
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        let credentials = config.username.clone().map(|username| Credentials {
            username,
            password: config.password.clone(),
        });
        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    /// Checks that the server answers at all. Used once before a batch so
    /// that an unreachable server is a fatal error rather than N failures.
    pub async fn ping(&self) -> Result<()> {
        let response = self
            .authorize(self.http.get(self.base_url.clone()))
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(StoreError::Unavailable(format!(
                "{} answered HTTP {}",
                self.base_url,
                response.status()
            )));
        }
        Ok(())
    }

    pub fn database(&self, name: &str) -> CouchStore {
        CouchStore {
            server: self.clone(),
            db: name.to_string(),
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(creds) => request.basic_auth(&creds.username, creds.password.as_deref()),
            None => request,
        }
    }
}

/// A single CouchDB database.
#[derive(Clone, Debug)]
pub struct CouchStore {
    server: CouchServer,
    db: String,
}

#[derive(Deserialize)]
struct AllDocsResponse {
    rows: Vec<AllDocsRow>,
}

#[derive(Deserialize)]
struct AllDocsRow {
    id: String,
}

#[derive(Deserialize)]
struct FindResponse {
    docs: Vec<FindDoc>,
    #[serde(default)]
    warning: Option<String>,
}

#[derive(Deserialize)]
struct FindDoc {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Deserialize)]
struct IndexPage {
    docs: Vec<JsonMap<String, JsonValue>>,
    #[serde(default)]
    bookmark: Option<String>,
}

#[derive(Deserialize)]
struct PutResponse {
    rev: String,
}

impl CouchStore {
    fn url(&self, parts: &[&str]) -> Url {
        let mut url = self.server.base_url.clone();
        // `CouchServer::new` rejects cannot-be-a-base urls.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&self.db).extend(parts);
        }
        url
    }

    async fn find(&self, query: &JsonValue) -> Result<Response> {
        let request = self.server.http.post(self.url(&["_find"])).json(query);
        let response = self
            .server
            .authorize(request)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(unexpected_status(format!("POST {}/_find", self.db), response).await);
        }
        Ok(response)
    }

    fn qualified(&self, id: &DocumentId) -> String {
        format!("{}/{}", self.db, id)
    }
}

/// Timeouts and connection failures mean the store is unreachable; other
/// reqwest failures keep their original error.
fn transport_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() || err.is_connect() {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Http(err)
    }
}

async fn unexpected_status(context: String, response: Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    StoreError::Unavailable(format!("{context}: HTTP {status}: {body}"))
}

/// Splits a raw CouchDB document into its bookkeeping fields and content.
fn split_stored(id: &DocumentId, mut raw: JsonMap<String, JsonValue>) -> Result<StoredDocument> {
    raw.remove(ID_FIELD);
    let revision = match raw.remove(REV_FIELD) {
        Some(JsonValue::String(rev)) => Revision::new(rev),
        _ => {
            return Err(StoreError::Unavailable(format!(
                "document {id} was returned without a {REV_FIELD}"
            )))
        }
    };
    Ok(StoredDocument {
        id: id.clone(),
        revision,
        body: Document::from(raw),
    })
}

fn with_revision(body: &Document, revision: &Revision) -> JsonValue {
    let mut raw: JsonMap<String, JsonValue> = body.clone().into();
    raw.insert(REV_FIELD.to_string(), JsonValue::String(revision.to_string()));
    JsonValue::Object(raw)
}

#[async_trait]
impl DocumentStore for CouchStore {
    fn name(&self) -> &str {
        &self.db
    }

    async fn get_by_id(&self, id: &DocumentId) -> Result<Option<StoredDocument>> {
        let request = self.server.http.get(self.url(&[id.as_str()]));
        let response = self
            .server
            .authorize(request)
            .send()
            .await
            .map_err(transport_error)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let raw: JsonMap<String, JsonValue> = response.json().await?;
                split_stored(id, raw).map(Some)
            }
            _ => Err(unexpected_status(format!("GET {}", self.qualified(id)), response).await),
        }
    }

    async fn all_ids(&self) -> Result<Vec<DocumentId>> {
        let request = self.server.http.get(self.url(&["_all_docs"]));
        let response = self
            .server
            .authorize(request)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(unexpected_status(format!("GET {}/_all_docs", self.db), response).await);
        }
        let listing: AllDocsResponse = response.json().await?;
        Ok(listing
            .rows
            .into_iter()
            .filter(|row| !row.id.starts_with("_design/"))
            .map(|row| DocumentId::new(row.id))
            .collect())
    }

    async fn write(
        &self,
        id: &DocumentId,
        body: &Document,
        revision: &Revision,
    ) -> Result<Revision> {
        let request = self
            .server
            .http
            .put(self.url(&[id.as_str()]))
            .json(&with_revision(body, revision));
        let response = self
            .server
            .authorize(request)
            .send()
            .await
            .map_err(transport_error)?;
        match response.status() {
            StatusCode::CONFLICT => Err(StoreError::Conflict(format!(
                "{} changed since revision {}",
                self.qualified(id),
                revision
            ))),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(self.qualified(id))),
            status if status.is_success() => {
                let put: PutResponse = response.json().await?;
                Ok(Revision::new(put.rev))
            }
            _ => Err(unexpected_status(format!("PUT {}", self.qualified(id)), response).await),
        }
    }

    async fn find_by_field(&self, field: &str, value: &str) -> Result<Vec<DocumentId>> {
        let query = json!({
            "selector": { field: { "$eq": value } },
            "fields": [ID_FIELD],
        });
        let found: FindResponse = self.find(&query).await?.json().await?;
        if let Some(warning) = found.warning {
            log::debug!("{}/_find on '{}': {}", self.db, field, warning);
        }
        Ok(found.docs.into_iter().map(|d| DocumentId::new(d.id)).collect())
    }

    /// Pages through `_find` by bookmark, fetching only `_id` and `field`.
    async fn field_index(&self, field: &str) -> Result<Vec<(DocumentId, Option<String>)>> {
        let mut index = Vec::new();
        let mut bookmark: Option<String> = None;
        loop {
            let mut query = json!({
                "selector": { ID_FIELD: { "$gt": null } },
                "fields": [ID_FIELD, field],
                "limit": INDEX_PAGE_SIZE,
            });
            if let Some(mark) = &bookmark {
                query["bookmark"] = JsonValue::String(mark.clone());
            }
            let page: IndexPage = self.find(&query).await?.json().await?;
            let fetched = page.docs.len();
            index.extend(page.docs.into_iter().filter_map(|doc| index_entry(doc, field)));
            if fetched < INDEX_PAGE_SIZE {
                break;
            }
            bookmark = page.bookmark;
            if bookmark.is_none() {
                break;
            }
        }
        Ok(index)
    }
}

fn index_entry(
    mut doc: JsonMap<String, JsonValue>,
    field: &str,
) -> Option<(DocumentId, Option<String>)> {
    let id = match doc.remove(ID_FIELD) {
        Some(JsonValue::String(id)) if !id.starts_with("_design/") => id,
        _ => return None,
    };
    let value = match doc.remove(field) {
        Some(JsonValue::String(value)) => Some(value),
        _ => None,
    };
    Some((DocumentId::new(id), value))
}
