use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde_json::json;
use statusdb::{
    errors::{Result, StoreError},
    memory::MemoryStore,
    sync::{CandidateReport, OutcomeReporter, SyncCandidate},
    BusinessKey, Document,
};

/// A stripped-down sequencing run as it would come out of the LIMS.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub position: Option<&'static str>,
    pub flowcell_id: Option<&'static str>,
    pub cycles: Option<i64>,
}

#[allow(dead_code)]
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

#[allow(dead_code)]
pub fn days_ago(days: i64) -> NaiveDate {
    today() - chrono::Duration::days(days)
}

pub fn doc(raw: serde_json::Value) -> Document {
    Document::try_from(raw).unwrap()
}

#[allow(dead_code)]
pub fn run(position: &'static str, flowcell_id: &'static str, cycles: Option<i64>) -> RunRecord {
    RunRecord {
        position: Some(position),
        flowcell_id: Some(flowcell_id),
        cycles,
    }
}

#[allow(dead_code)]
pub fn candidate(record: RunRecord, completed_on: Option<NaiveDate>) -> SyncCandidate<RunRecord> {
    let key = match (record.position, record.flowcell_id) {
        (Some(position), Some(id)) => Some(BusinessKey::new(format!("{position}{id}"))),
        _ => None,
    };
    SyncCandidate::new(record, key, completed_on)
}

/// Derives the run summary; a record without cycles is malformed.
#[allow(dead_code)]
pub fn run_summary(record: &RunRecord) -> Result<Document> {
    let cycles = record
        .cycles
        .ok_or_else(|| StoreError::MalformedRecord("run has no cycle count".into()))?;
    Ok(doc(json!({ "cycles": cycles })))
}

/// A flowcell store seeded with one document per name, each with an empty
/// `illumina` section.
#[allow(dead_code)]
pub async fn flowcell_store(names: &[&str]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new("flowcells"));
    for (i, name) in names.iter().enumerate() {
        store
            .insert(
                format!("fc-{i}"),
                doc(json!({ "name": name, "illumina": { "run_summary": {} } })),
            )
            .await;
    }
    store
}

/// Collects the key label and outcome label of every reported candidate.
#[allow(dead_code)]
#[derive(Default)]
pub struct CollectingReporter {
    pub seen: Mutex<Vec<(String, &'static str)>>,
}

impl OutcomeReporter for CollectingReporter {
    fn report(&self, _batch: &str, report: &CandidateReport) {
        self.seen
            .lock()
            .unwrap()
            .push((report.key_label(), report.outcome.label()));
    }
}
