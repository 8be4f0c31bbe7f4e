use std::sync::Arc;

use statusdb::errors::{Result as StoreResult, StoreError};
use statusdb::sync::SyncCandidate;
use statusdb::Document;

use crate::client::{HttpLimsService, LimsConfig, LimsService};
use crate::mapper;
use crate::models::{
    ProcessQuery, SequencingProcess, FLOWCELL_ID_UDF, FLOWCELL_POSITION_UDF,
    SEQUENCING_PROCESS_TYPE,
};
use crate::params::FlowcellName;

/// Produces flowcell candidates for the batch driver from LIMS sequencing
/// processes.
pub struct FlowcellFetcher {
    client: Arc<dyn LimsService>,
}

impl FlowcellFetcher {
    pub fn new(client: Arc<dyn LimsService>) -> Self {
        Self { client }
    }

    pub fn with_default_client(config: &LimsConfig) -> StoreResult<Self> {
        let client = HttpLimsService::new(config).map_err(|err| {
            StoreError::Config(format!("failed to create LIMS client: {err}"))
        })?;
        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Every sequencing process known to the LIMS.
    pub async fn all_candidates(&self) -> StoreResult<Vec<SyncCandidate<SequencingProcess>>> {
        let query = ProcessQuery::of_type(SEQUENCING_PROCESS_TYPE);
        let processes = self
            .client
            .list_processes(&query)
            .await
            .map_err(|err| err.into_store_error())?;
        log::info!("Fetched {} sequencing process(es) from LIMS", processes.len());
        Ok(processes.into_iter().map(mapper::candidate_from_process).collect())
    }

    /// The sequencing process(es) of one flowcell.
    pub async fn single_candidate(
        &self,
        name: &FlowcellName,
    ) -> StoreResult<Vec<SyncCandidate<SequencingProcess>>> {
        let query = ProcessQuery::of_type(SEQUENCING_PROCESS_TYPE)
            .with_udf(FLOWCELL_POSITION_UDF, name.position.as_str())
            .with_udf(FLOWCELL_ID_UDF, name.flowcell_id.as_str());
        let processes = self
            .client
            .list_processes(&query)
            .await
            .map_err(|err| err.into_store_error())?;
        if processes.is_empty() {
            return Err(StoreError::NotFound(format!(
                "no sequencing process for flowcell {name}"
            )));
        }
        if processes.len() > 1 {
            log::warn!(
                "Flowcell {} has {} sequencing processes in LIMS",
                name,
                processes.len()
            );
        }
        Ok(processes.into_iter().map(mapper::candidate_from_process).collect())
    }
}

/// Sub-tree derivation for `SubtreeUpload`; LIMS field errors surface as
/// malformed records.
pub fn derive_run_summary(process: &SequencingProcess) -> StoreResult<Document> {
    mapper::run_summary_from_process(process).map_err(|err| err.into_store_error())
}
