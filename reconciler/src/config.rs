use std::path::{Path, PathBuf};

use anyhow::Context;
use limsfetcher::LimsConfig;
use serde::Deserialize;
use statusdb::config::StatusDbConfig;

/// Contents of `post_process.yaml`.
#[derive(Deserialize, Debug, Clone)]
pub struct ReconcilerConfig {
    pub statusdb: StatusDbConfig,
    #[serde(default)]
    pub lims: Option<LimsConfig>,
    /// Overrides `statusdb.catalog_path` when set.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    /// Each command also appends its log to `<log_dir>/<command>.log`.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl ReconcilerConfig {
    /// `~/opt/config/post_process.yaml`
    pub fn default_path() -> PathBuf {
        let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
        home.join("opt").join("config").join("post_process.yaml")
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        let mut config: Self = serde_yaml::from_str(raw).context("invalid configuration")?;
        if let Some(path) = &config.catalog_path {
            config.statusdb.catalog_path = Some(path.clone());
        }
        Ok(config)
    }

    /// Reads the file and applies the credential environment overrides.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::load_file(path)?.with_env_overrides())
    }

    /// Reads the file as written, without consulting the environment.
    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Loads the two sides of an environment comparison.
    ///
    /// The `STATUSDB_*` variables name a single server, so applying them here
    /// would point both sides at it. Each side keeps the server its file names.
    pub fn load_environments(left: &Path, right: &Path) -> anyhow::Result<(Self, Self)> {
        Ok((Self::load_file(left)?, Self::load_file(right)?))
    }

    pub fn with_env_overrides(mut self) -> Self {
        self.statusdb = self.statusdb.with_env_overrides();
        self.lims = self.lims.map(LimsConfig::with_env_overrides);
        self
    }

    pub fn lims(&self) -> anyhow::Result<&LimsConfig> {
        self.lims
            .as_ref()
            .context("configuration has no 'lims' section")
    }
}
