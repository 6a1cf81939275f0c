use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use taskflow_core::WorkflowCheckpoint;

use crate::error::Result;

/// Durable snapshot store for `WorkflowCheckpoint`s, keyed by workflow id
/// (GLOSSARY: Checkpoint). A sqlite-backed implementation lives in
/// `taskflow-store`; this crate only needs the trait plus an in-memory
/// implementation for engine tests.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn save(&self, checkpoint: WorkflowCheckpoint) -> Result<()>;
    async fn latest(&self, workflow_id: &str) -> Result<Option<WorkflowCheckpoint>>;
    async fn load_by_id(&self, checkpoint_id: &str) -> Result<Option<WorkflowCheckpoint>>;
    async fn list(&self, workflow_id: &str) -> Result<Vec<WorkflowCheckpoint>>;
}

#[derive(Default)]
pub struct InMemoryCheckpointer {
    checkpoints: Arc<RwLock<HashMap<String, Vec<WorkflowCheckpoint>>>>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn save(&self, checkpoint: WorkflowCheckpoint) -> Result<()> {
        let mut guard = self.checkpoints.write().await;
        guard.entry(checkpoint.workflow_id.clone()).or_default().push(checkpoint);
        Ok(())
    }

    async fn latest(&self, workflow_id: &str) -> Result<Option<WorkflowCheckpoint>> {
        let guard = self.checkpoints.read().await;
        Ok(guard.get(workflow_id).and_then(|v| v.last().cloned()))
    }

    async fn load_by_id(&self, checkpoint_id: &str) -> Result<Option<WorkflowCheckpoint>> {
        let guard = self.checkpoints.read().await;
        Ok(guard
            .values()
            .flatten()
            .find(|c| c.checkpoint_id == checkpoint_id)
            .cloned())
    }

    async fn list(&self, workflow_id: &str) -> Result<Vec<WorkflowCheckpoint>> {
        let guard = self.checkpoints.read().await;
        Ok(guard.get(workflow_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let store = InMemoryCheckpointer::new();
        let checkpoint = WorkflowCheckpoint::new("wf1", "research", json!({"x": 1}));
        let id = checkpoint.checkpoint_id.clone();
        store.save(checkpoint).await.unwrap();

        let latest = store.latest("wf1").await.unwrap().unwrap();
        assert_eq!(latest.checkpoint_id, id);

        let by_id = store.load_by_id(&id).await.unwrap().unwrap();
        assert_eq!(by_id.node_name, "research");
    }
}
