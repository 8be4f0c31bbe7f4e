use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Key '{key}' matches {matches} documents")]
    AmbiguousKey { key: String, matches: usize },

    #[error("Revision conflict: {0}")]
    Conflict(String),

    #[error("Malformed source record: {0}")]
    MalformedRecord(String),

    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid sub-tree path: {0}")]
    InvalidPath(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite operation failed: {0}")]
    SQLite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    /// True for the two outcomes of a key lookup that mean "no single target".
    pub fn is_resolution_miss(&self) -> bool {
        matches!(self, StoreError::NotFound(_) | StoreError::AmbiguousKey { .. })
    }

    /// Short, stable label used in logs and the run catalog.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::AmbiguousKey { .. } => "ambiguous_key",
            StoreError::Conflict(_) => "conflict",
            StoreError::MalformedRecord(_) => "malformed_record",
            StoreError::Unavailable(_) | StoreError::Http(_) => "store_unavailable",
            StoreError::InvalidPath(_) => "invalid_path",
            StoreError::Json(_) => "json",
            StoreError::SQLite(_) => "sqlite",
            StoreError::Io(_) => "io",
            StoreError::Config(_) => "config",
            StoreError::Other(_) => "other",
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
