use chrono::NaiveDate;
use statusdb::sync::SyncCandidate;
use statusdb::{BusinessKey, Document, Value};

use crate::error::{LimsError, Result};
use crate::models::{SequencingProcess, FLOWCELL_ID_UDF, FLOWCELL_POSITION_UDF};

/// Flowcell name as stored in StatusDB: position letter + flowcell id.
pub fn flowcell_key(process: &SequencingProcess) -> Option<BusinessKey> {
    let position = process.udf_text(FLOWCELL_POSITION_UDF)?;
    let flowcell_id = process.udf_text(FLOWCELL_ID_UDF)?;
    Some(BusinessKey::new(format!("{position}{flowcell_id}")))
}

pub fn run_date(process: &SequencingProcess) -> Option<NaiveDate> {
    let raw = process.date_run.as_deref()?;
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(err) => {
            log::warn!("Process {} has unparsable date_run '{}': {}", process.id, raw, err);
            None
        }
    }
}

pub fn candidate_from_process(process: SequencingProcess) -> SyncCandidate<SequencingProcess> {
    let key = flowcell_key(&process);
    let completed_on = run_date(&process);
    SyncCandidate::new(process, key, completed_on)
}

/// The `run_summary` sub-tree for a sequencing process: its UDFs by name,
/// plus `process_id` and `date_run`.
pub fn run_summary_from_process(process: &SequencingProcess) -> Result<Document> {
    if process.udf.is_empty() {
        return Err(LimsError::MissingField(format!(
            "process {} carries no run parameters",
            process.id
        )));
    }
    if process.udf_text(FLOWCELL_ID_UDF).is_none() {
        return Err(LimsError::MissingField(format!(
            "process {} has no '{}'",
            process.id, FLOWCELL_ID_UDF
        )));
    }

    let mut summary: Document = process
        .udf
        .iter()
        .map(|(name, value)| (name.clone(), Value::from(value.clone())))
        .collect();
    summary.insert("process_id", process.id.as_str());
    if let Some(date_run) = &process.date_run {
        summary.insert("date_run", date_run.as_str());
    }
    Ok(summary)
}
