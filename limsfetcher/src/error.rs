use statusdb::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LimsError {
    #[error("missing field: {0}")]
    MissingField(String),

    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("LIMS API error: {0}")]
    Api(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LimsError {
    /// Maps a LIMS failure onto the reconciliation error taxonomy: bad
    /// records are malformed, everything else means the source is unusable.
    pub fn into_store_error(self) -> StoreError {
        match self {
            LimsError::MissingField(_) | LimsError::InvalidParam(_) => {
                StoreError::MalformedRecord(self.to_string())
            }
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, LimsError>;
