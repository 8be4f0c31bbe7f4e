pub mod catalog;
pub mod config;
pub mod couch;
pub mod diff;
pub mod document;
pub mod errors;
pub mod memory;
pub mod merge;
pub mod models;
pub mod reconcile;
pub mod resolver;
pub mod store;
pub mod sync;

use crate::catalog::Catalog;
use crate::config::StatusDbConfig;
use crate::couch::CouchServer;
use crate::errors::Result;
use crate::store::DocumentStore;
use std::sync::Arc;

pub use crate::diff::{diff, differs, DiffEntry, DiffReport};
pub use crate::document::{Document, KeyPath, Value};
pub use crate::errors::StoreError;
pub use crate::models::{BusinessKey, DocumentId, Revision, StoredDocument};

/// The main entry point for the `statusdb` library.
///
/// `StatusDb` bundles a connection to one StatusDB (CouchDB) server with
/// the optional run catalog:
/// - [`CouchServer`] hands out [`DocumentStore`]s for individual databases
///   such as `flowcells` or `projects`.
/// - [`Catalog`] records batch runs in SQLite when `catalog_path` is set.
///
/// # Example
///
/// ```rust,no_run
/// use statusdb::{StatusDb, config::StatusDbConfig, store::DocumentStore};
///
/// #[tokio::main]
/// async fn main() {
///     let config = StatusDbConfig::new("http://localhost:5984");
///     let statusdb = StatusDb::connect(config).await.unwrap();
///     let flowcells = statusdb.database("flowcells");
///     let ids = flowcells.all_ids().await.unwrap();
///     println!("{} flowcells", ids.len());
/// }
/// ```
pub struct StatusDb {
    pub config: StatusDbConfig,
    pub server: CouchServer,
    pub catalog: Option<Arc<Catalog>>,
}

impl StatusDb {
    /// Connects to the configured server.
    ///
    /// This will:
    /// 1. Build the HTTP client with the configured request timeout.
    /// 2. Ping the server, so an unreachable store fails here and not
    ///    once per candidate.
    /// 3. Open the run catalog and initialize its schema, if configured.
    pub async fn connect(config: StatusDbConfig) -> Result<Self> {
        let server = CouchServer::new(&config)?;
        server.ping().await?;
        log::info!("Connected to StatusDB at {}", config.url);

        let catalog = match &config.catalog_path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let catalog = Catalog::new(path)?;
                catalog.initialize_schema()?;
                Some(Arc::new(catalog))
            }
            None => None,
        };

        Ok(Self {
            config,
            server,
            catalog,
        })
    }

    pub fn database(&self, name: &str) -> Arc<dyn DocumentStore> {
        Arc::new(self.server.database(name))
    }
}
