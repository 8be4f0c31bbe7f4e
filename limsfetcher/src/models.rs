use serde::Deserialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

/// Process type of the sequencing step whose runs are uploaded.
pub const SEQUENCING_PROCESS_TYPE: &str = "Illumina Sequencing (Illumina SBS) 4.0";

pub const FLOWCELL_POSITION_UDF: &str = "Flow Cell Position";
pub const FLOWCELL_ID_UDF: &str = "Flow Cell ID";

/// A LIMS process as returned by the process listing.
#[derive(Debug, Clone, Deserialize)]
pub struct SequencingProcess {
    pub id: String,
    #[serde(rename = "type")]
    pub process_type: String,
    /// Run date as `YYYY-MM-DD`.
    #[serde(default)]
    pub date_run: Option<String>,
    /// User-defined fields attached to the process.
    #[serde(default)]
    pub udf: JsonMap<String, JsonValue>,
}

impl SequencingProcess {
    /// A UDF rendered as text; numbers and booleans are stringified.
    pub fn udf_text(&self, name: &str) -> Option<String> {
        match self.udf.get(name)? {
            JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            JsonValue::Number(n) => Some(n.to_string()),
            JsonValue::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// Filter for the process listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessQuery {
    pub process_type: String,
    pub udf: Vec<(String, String)>,
}

impl ProcessQuery {
    pub fn of_type(process_type: impl Into<String>) -> Self {
        Self {
            process_type: process_type.into(),
            udf: Vec::new(),
        }
    }

    pub fn with_udf(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.udf.push((name.into(), value.into()));
        self
    }

    /// Query-string pairs, e.g. `type=...&udf.Flow Cell ID=...`.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("type".to_string(), self.process_type.clone())];
        pairs.extend(
            self.udf
                .iter()
                .map(|(name, value)| (format!("udf.{name}"), value.clone())),
        );
        pairs
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProcessListing {
    #[serde(default)]
    pub processes: Vec<SequencingProcess>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_udf_text_normalizes_scalars() {
        let process: SequencingProcess = serde_json::from_value(json!({
            "id": "24-1234",
            "type": SEQUENCING_PROCESS_TYPE,
            "udf": {"Flow Cell ID": " AD1TAPACXX ", "Read 1 Cycles": 101, "Blank": "  ", "Nested": {}}
        }))
        .unwrap();

        assert_eq!(process.udf_text("Flow Cell ID").as_deref(), Some("AD1TAPACXX"));
        assert_eq!(process.udf_text("Read 1 Cycles").as_deref(), Some("101"));
        assert_eq!(process.udf_text("Blank"), None);
        assert_eq!(process.udf_text("Nested"), None);
        assert_eq!(process.date_run, None);
    }

    #[test]
    fn test_query_pairs() {
        let query = ProcessQuery::of_type(SEQUENCING_PROCESS_TYPE)
            .with_udf(FLOWCELL_ID_UDF, "AD1TAPACXX")
            .with_udf(FLOWCELL_POSITION_UDF, "A");
        assert_eq!(
            query.to_pairs(),
            vec![
                ("type".to_string(), SEQUENCING_PROCESS_TYPE.to_string()),
                ("udf.Flow Cell ID".to_string(), "AD1TAPACXX".to_string()),
                ("udf.Flow Cell Position".to_string(), "A".to_string()),
            ]
        );
    }
}
