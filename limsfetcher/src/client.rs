use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::error::{LimsError, Result};
use crate::models::{ProcessListing, ProcessQuery, SequencingProcess};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Deserialize, Debug, Clone)]
pub struct LimsConfig {
    /// API root, e.g. `https://lims.example.org/api/v2`.
    pub base_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl LimsConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username: None,
            password: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Applies `LIMS_BASE_URL`, `LIMS_USERNAME` and `LIMS_PASSWORD`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("LIMS_BASE_URL") {
            self.base_url = url;
        }
        if let Ok(username) = std::env::var("LIMS_USERNAME") {
            self.username = Some(username);
        }
        if let Ok(password) = std::env::var("LIMS_PASSWORD") {
            self.password = Some(password);
        }
        self
    }
}

/// Read access to the laboratory information system.
#[async_trait]
pub trait LimsService: Send + Sync {
    async fn list_processes(&self, query: &ProcessQuery) -> Result<Vec<SequencingProcess>>;
}

/// `LimsService` backed by the LIMS REST API.
pub struct HttpLimsService {
    http_client: reqwest::Client,
    base_url: Url,
    credentials: Option<(String, Option<String>)>,
}

impl HttpLimsService {
    pub fn new(config: &LimsConfig) -> Result<Self> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|err| LimsError::InvalidParam(format!("LIMS url '{}': {err}", config.base_url)))?;
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let credentials = config
            .username
            .clone()
            .map(|user| (user, config.password.clone()));
        Ok(Self {
            http_client,
            base_url,
            credentials,
        })
    }

    fn processes_url(&self) -> String {
        format!("{}/processes", self.base_url.as_str().trim_end_matches('/'))
    }
}

#[async_trait]
impl LimsService for HttpLimsService {
    async fn list_processes(&self, query: &ProcessQuery) -> Result<Vec<SequencingProcess>> {
        let mut request = self
            .http_client
            .get(self.processes_url())
            .query(&query.to_pairs());
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, password.as_ref());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LimsError::Api(format!("GET processes returned {status}: {body}")));
        }

        let listing: ProcessListing = response.json().await?;
        log::debug!(
            "LIMS returned {} process(es) of type '{}'",
            listing.processes.len(),
            query.process_type
        );
        Ok(listing.processes)
    }
}
