use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{LobbyflowError, Result};

/// Run-scoped input shared by every node of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    #[serde(default)]
    pub form_data: Map<String, Value>,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default)]
    pub triggered_by: String,
}

impl ExecutionContext {
    pub fn new(triggered_by: impl Into<String>) -> Self {
        Self {
            triggered_by: triggered_by.into(),
            ..Self::default()
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.form_data.insert(key.into(), value);
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.form_data.get(key)
    }

    pub fn set_variable(&mut self, key: impl Into<String>, value: Value) {
        self.variables.insert(key.into(), value);
    }
}

/// Status of a run. Only ever moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Completed | Self::Failed | Self::Cancelled => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 2
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Outcome of a single node visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Success,
    Failed,
    Skipped,
}

/// One entry per visited node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionHistory {
    pub node_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub status: HistoryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionHistory {
    pub fn success(node_id: impl Into<String>, started_at: DateTime<Utc>, output: Value) -> Self {
        Self::finish(node_id, started_at, HistoryStatus::Success, Some(output), None)
    }

    pub fn failed(node_id: impl Into<String>, started_at: DateTime<Utc>, error: String) -> Self {
        Self::finish(node_id, started_at, HistoryStatus::Failed, None, Some(error))
    }

    pub fn skipped(node_id: impl Into<String>, started_at: DateTime<Utc>, reason: String) -> Self {
        Self::finish(node_id, started_at, HistoryStatus::Skipped, None, Some(reason))
    }

    fn finish(
        node_id: impl Into<String>,
        started_at: DateTime<Utc>,
        status: HistoryStatus,
        output: Option<Value>,
        error: Option<String>,
    ) -> Self {
        // Wall clock can step backwards; completion never precedes the start.
        let completed_at = Utc::now().max(started_at);
        Self {
            node_id: node_id.into(),
            started_at,
            completed_at,
            status,
            output,
            error,
        }
    }
}

/// The record of one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub id: String,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub current_node_id: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub context: ExecutionContext,
    #[serde(default)]
    pub history: Vec<ExecutionHistory>,
}

impl WorkflowExecution {
    pub fn new(workflow_id: impl Into<String>, context: ExecutionContext) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            workflow_id: workflow_id.into(),
            status: ExecutionStatus::Pending,
            current_node_id: None,
            started_at: Utc::now(),
            completed_at: None,
            context,
            history: vec![],
        }
    }

    /// Move to `next`, rejecting anything that is not strictly forward.
    pub fn transition(&mut self, next: ExecutionStatus) -> Result<()> {
        if next.rank() <= self.status.rank() {
            return Err(LobbyflowError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now().max(self.started_at));
        } else if next == ExecutionStatus::InProgress {
            self.started_at = Utc::now();
        }
        Ok(())
    }

    pub fn record(&mut self, entry: ExecutionHistory) {
        self.history.push(entry);
    }

    pub fn entries_for<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a ExecutionHistory> + 'a {
        self.history.iter().filter(move |h| h.node_id == node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_forward_transitions() {
        let mut exec = WorkflowExecution::new("wf1", ExecutionContext::default());
        assert_eq!(exec.status, ExecutionStatus::Pending);

        exec.transition(ExecutionStatus::InProgress).unwrap();
        exec.transition(ExecutionStatus::Completed).unwrap();
        assert!(exec.completed_at.is_some());
        assert!(exec.completed_at.unwrap() >= exec.started_at);
    }

    #[test]
    fn test_backward_transition_rejected() {
        let mut exec = WorkflowExecution::new("wf1", ExecutionContext::default());
        exec.transition(ExecutionStatus::InProgress).unwrap();
        exec.transition(ExecutionStatus::Failed).unwrap();

        let err = exec.transition(ExecutionStatus::InProgress).unwrap_err();
        assert!(matches!(err, LobbyflowError::InvalidTransition { .. }));
        assert!(exec.transition(ExecutionStatus::Completed).is_err());
        assert_eq!(exec.status, ExecutionStatus::Failed);
    }

    #[test]
    fn test_pending_cannot_repeat() {
        let mut exec = WorkflowExecution::new("wf1", ExecutionContext::default());
        assert!(exec.transition(ExecutionStatus::Pending).is_err());
    }

    #[test]
    fn test_history_timestamps_ordered() {
        let started = Utc::now() + chrono::Duration::seconds(5);
        let entry = ExecutionHistory::success("n1", started, json!({}));
        assert!(entry.completed_at >= entry.started_at);
    }

    #[test]
    fn test_execution_wire_format() {
        let ctx = ExecutionContext::new("kiosk-1").with_field("name", json!("Alice"));
        let mut exec = WorkflowExecution::new("wf1", ctx);
        exec.transition(ExecutionStatus::InProgress).unwrap();
        exec.record(ExecutionHistory::failed("n1", Utc::now(), "boom".into()));

        let v = serde_json::to_value(&exec).unwrap();
        assert_eq!(v["workflowId"], "wf1");
        assert_eq!(v["status"], "in_progress");
        assert_eq!(v["context"]["formData"]["name"], "Alice");
        assert_eq!(v["context"]["triggeredBy"], "kiosk-1");
        assert_eq!(v["history"][0]["nodeId"], "n1");
        assert_eq!(v["history"][0]["status"], "failed");
        assert_eq!(v["history"][0]["error"], "boom");
        assert!(v["history"][0].get("output").is_none());
    }
}
