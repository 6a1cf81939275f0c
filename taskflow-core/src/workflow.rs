use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ObjectiveId, WorkflowId, new_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    Research,
    Analysis,
    Executor,
    Multiagent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub workflow_id: WorkflowId,
    pub objective_id: ObjectiveId,
    pub workflow_type: WorkflowType,
    pub status: WorkflowStatus,
    pub current_node: Option<String>,
    pub is_paused: bool,
    /// Opaque JSON mirroring `State`, sufficient to resume.
    pub serialized_state: Value,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Workflow {
    pub fn new(objective_id: impl Into<String>, workflow_type: WorkflowType) -> Self {
        Self {
            workflow_id: new_id(),
            objective_id: objective_id.into(),
            workflow_type,
            status: WorkflowStatus::Running,
            current_node: None,
            is_paused: false,
            serialized_state: Value::Null,
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            completed_at: None,
        }
    }

    pub fn advance(&mut self, node: impl Into<String>, serialized_state: Value) {
        self.current_node = Some(node.into());
        self.serialized_state = serialized_state;
    }

    pub fn finish(&mut self, status: WorkflowStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    pub fn pause(&mut self) {
        self.is_paused = true;
    }

    pub fn resume(&mut self) {
        self.is_paused = false;
    }
}
