use std::fmt;

use crate::error::{LimsError, Result};

/// A flowcell as named on the command line and in StatusDB: the position
/// letter followed by the flowcell id, e.g. `AAD1TAPACXX`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowcellName {
    pub position: String,
    pub flowcell_id: String,
}

impl FlowcellName {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let mut chars = raw.chars();
        match chars.next() {
            Some(position) if position.is_ascii_alphabetic() && !chars.as_str().is_empty() => {
                Ok(Self {
                    position: position.to_string(),
                    flowcell_id: chars.as_str().to_string(),
                })
            }
            _ => Err(LimsError::InvalidParam(format!(
                "flowcell must be <position><flowcell id>, got '{raw}'"
            ))),
        }
    }

    pub fn new(position: impl Into<String>, flowcell_id: impl Into<String>) -> Self {
        Self {
            position: position.into(),
            flowcell_id: flowcell_id.into(),
        }
    }
}

impl fmt::Display for FlowcellName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.position, self.flowcell_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_position() {
        let name = FlowcellName::parse("AAD1TAPACXX").unwrap();
        assert_eq!(name.position, "A");
        assert_eq!(name.flowcell_id, "AD1TAPACXX");
        assert_eq!(name.to_string(), "AAD1TAPACXX");
    }

    #[test]
    fn test_parse_rejects_short_or_odd_names() {
        assert!(FlowcellName::parse("").is_err());
        assert!(FlowcellName::parse("A").is_err());
        assert!(FlowcellName::parse("1AD1TAPACXX").is_err());
    }
}
