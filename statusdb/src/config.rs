use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Deserialize, Debug, Clone)]
pub struct StatusDbConfig {
    /// Base URL of the CouchDB server, e.g. `http://couch.example.org:5984`.
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Upper bound for every request made against the server.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Optional SQLite file recording batch runs.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

impl StatusDbConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            catalog_path: None,
        }
    }

    /// Applies `STATUSDB_URL`, `STATUSDB_USERNAME` and `STATUSDB_PASSWORD`
    /// from the environment on top of the file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("STATUSDB_URL") {
            self.url = url;
        }
        if let Ok(username) = std::env::var("STATUSDB_USERNAME") {
            self.username = Some(username);
        }
        if let Ok(password) = std::env::var("STATUSDB_PASSWORD") {
            self.password = Some(password);
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
