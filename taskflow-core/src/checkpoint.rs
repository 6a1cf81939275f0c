use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{CheckpointId, WorkflowId, new_id};

/// A durable, append-only snapshot of `serialized_state` taken at a named
/// node (spec.md §3's WorkflowCheckpoint entity).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowCheckpoint {
    pub checkpoint_id: CheckpointId,
    pub workflow_id: WorkflowId,
    pub node_name: String,
    pub state: Value,
    pub created_at: DateTime<Utc>,
}

impl WorkflowCheckpoint {
    pub fn new(workflow_id: impl Into<String>, node_name: impl Into<String>, state: Value) -> Self {
        Self {
            checkpoint_id: new_id(),
            workflow_id: workflow_id.into(),
            node_name: node_name.into(),
            state,
            created_at: Utc::now(),
        }
    }
}
