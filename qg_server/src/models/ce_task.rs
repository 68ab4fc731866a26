//! Compute Engine task descriptors and quality-gate payloads.

use std::fmt;

use serde::{Serialize, Serializer};

/// Status of a CE task, case-insensitive on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CeStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    Canceled,
    /// Value this client does not know, kept verbatim.
    Other(String),
}

impl CeStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "PENDING" => CeStatus::Pending,
            "IN_PROGRESS" => CeStatus::InProgress,
            "SUCCESS" => CeStatus::Success,
            "FAILED" => CeStatus::Failed,
            "CANCELED" => CeStatus::Canceled,
            _ => CeStatus::Other(raw.to_string()),
        }
    }

    /// Once terminal, the server-side outcome can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CeStatus::Success | CeStatus::Failed | CeStatus::Canceled
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            CeStatus::Pending => "PENDING",
            CeStatus::InProgress => "IN_PROGRESS",
            CeStatus::Success => "SUCCESS",
            CeStatus::Failed => "FAILED",
            CeStatus::Canceled => "CANCELED",
            CeStatus::Other(raw) => raw,
        }
    }

    /// Bounded label for metrics; unknown wire values collapse to `other`.
    pub fn metric_label(&self) -> &'static str {
        match self {
            CeStatus::Pending => "PENDING",
            CeStatus::InProgress => "IN_PROGRESS",
            CeStatus::Success => "SUCCESS",
            CeStatus::Failed => "FAILED",
            CeStatus::Canceled => "CANCELED",
            CeStatus::Other(_) => "other",
        }
    }
}

impl fmt::Display for CeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Result of polling `/api/ce/task`.
#[derive(Debug, Clone, Serialize)]
pub struct CeTask {
    pub status: CeStatus,
    pub component_name: String,
    pub component_key: String,
    /// URL the descriptor was fetched from.
    pub url: String,
    /// Only present once the task has finished.
    pub analysis_id: Option<String>,
}

/// Quality-gate status, with the project name when the endpoint reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectQualityGate {
    pub project_name: Option<String>,
    pub status: String,
}

impl ProjectQualityGate {
    pub fn new(project_name: Option<String>, status: impl Into<String>) -> Self {
        Self {
            project_name,
            status: status.into(),
        }
    }
}

/// Completion notification pushed by the server for one CE task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskCompleted {
    pub task_id: String,
    pub task_status: CeStatus,
    /// Set for successful tasks only; `NONE` when no quality gate applies.
    pub quality_gate_status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!(CeStatus::parse("success"), CeStatus::Success);
        assert_eq!(CeStatus::parse("In_Progress"), CeStatus::InProgress);
        assert_eq!(CeStatus::parse("CANCELED"), CeStatus::Canceled);
        assert_eq!(
            CeStatus::parse("Exploded"),
            CeStatus::Other("Exploded".to_string())
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(CeStatus::Success.is_terminal());
        assert!(CeStatus::Failed.is_terminal());
        assert!(CeStatus::Canceled.is_terminal());
        assert!(!CeStatus::Pending.is_terminal());
        assert!(!CeStatus::InProgress.is_terminal());
        assert!(!CeStatus::Other("weird".into()).is_terminal());
    }

    #[test]
    fn test_metric_label_is_bounded() {
        assert_eq!(CeStatus::Success.metric_label(), "SUCCESS");
        assert_eq!(CeStatus::parse("in_progress").metric_label(), "IN_PROGRESS");
        assert_eq!(CeStatus::parse("<script>x</script>").metric_label(), "other");
    }

    #[test]
    fn test_status_serializes_as_wire_string() {
        let json = serde_json::to_string(&CeStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }
}
