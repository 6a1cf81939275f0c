use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use taskflow_core::{
    ObjectiveStatus, StepStatus, TaskStatus, Objective, Step, Task, Workflow, WorkflowCheckpoint,
};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::traits::{Store, WorkflowMutation};

#[derive(Default)]
struct Tables {
    objectives: HashMap<String, Objective>,
    tasks: HashMap<String, Task>,
    steps: HashMap<String, Step>,
    workflows: HashMap<String, Workflow>,
    checkpoints: HashMap<String, Vec<WorkflowCheckpoint>>,
}

/// `RwLock`-guarded in-memory store for engine/unit tests that don't need
/// sqlite, the equivalent role `InMemoryCheckpointer` plays for graph tests.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_objective(&self, objective: &Objective) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.objectives.insert(objective.objective_id.clone(), objective.clone());
        Ok(())
    }

    async fn upsert_task(&self, task: &Task) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.tasks.insert(task.task_id.clone(), task.clone());
        Ok(())
    }

    async fn upsert_step(&self, step: &Step) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.steps.insert(step.step_id.clone(), step.clone());
        Ok(())
    }

    async fn create_workflow(&self, workflow: &Workflow) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.workflows.insert(workflow.workflow_id.clone(), workflow.clone());
        Ok(())
    }

    async fn update_workflow(&self, workflow: &Workflow) -> Result<()> {
        self.create_workflow(workflow).await
    }

    async fn create_checkpoint(&self, checkpoint: &WorkflowCheckpoint) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .checkpoints
            .entry(checkpoint.workflow_id.clone())
            .or_default()
            .push(checkpoint.clone());
        Ok(())
    }

    async fn update_objective_status(
        &self,
        id: &str,
        status: ObjectiveStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let objective = tables
            .objectives
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("objective {id}")))?;
        objective.status = status;
        objective.completed_at = completed_at;
        Ok(())
    }

    async fn update_task_status(&self, id: &str, status: TaskStatus) -> Result<()> {
        let mut tables = self.tables.write().await;
        let task = tables.tasks.get_mut(id).ok_or_else(|| StoreError::NotFound(format!("task {id}")))?;
        task.status = status;
        Ok(())
    }

    async fn update_step_status(&self, id: &str, status: StepStatus) -> Result<()> {
        let mut tables = self.tables.write().await;
        let step = tables.steps.get_mut(id).ok_or_else(|| StoreError::NotFound(format!("step {id}")))?;
        step.status = status;
        Ok(())
    }

    async fn commit_mutation(&self, mutation: WorkflowMutation) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(objective) = mutation.objective {
            tables.objectives.insert(objective.objective_id.clone(), objective);
        }
        for task in mutation.tasks {
            tables.tasks.insert(task.task_id.clone(), task);
        }
        for step in mutation.steps {
            tables.steps.insert(step.step_id.clone(), step);
        }
        if let Some(workflow) = mutation.workflow {
            tables.workflows.insert(workflow.workflow_id.clone(), workflow);
        }
        if let Some(checkpoint) = mutation.checkpoint {
            tables.checkpoints.entry(checkpoint.workflow_id.clone()).or_default().push(checkpoint);
        }
        Ok(())
    }

    async fn get_objective(&self, id: &str) -> Result<Objective> {
        let tables = self.tables.read().await;
        tables.objectives.get(id).cloned().ok_or_else(|| StoreError::NotFound(format!("objective {id}")))
    }

    async fn get_task(&self, id: &str) -> Result<Task> {
        let tables = self.tables.read().await;
        tables.tasks.get(id).cloned().ok_or_else(|| StoreError::NotFound(format!("task {id}")))
    }

    async fn list_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>> {
        let tables = self.tables.read().await;
        Ok(tables.tasks.values().filter(|t| t.status == status).cloned().collect())
    }

    async fn get_step(&self, id: &str) -> Result<Step> {
        let tables = self.tables.read().await;
        tables.steps.get(id).cloned().ok_or_else(|| StoreError::NotFound(format!("step {id}")))
    }

    async fn get_workflow(&self, id: &str) -> Result<Workflow> {
        let tables = self.tables.read().await;
        tables.workflows.get(id).cloned().ok_or_else(|| StoreError::NotFound(format!("workflow {id}")))
    }

    async fn list_workflows_for_objective(&self, objective_id: &str) -> Result<Vec<Workflow>> {
        let tables = self.tables.read().await;
        Ok(tables
            .workflows
            .values()
            .filter(|w| w.objective_id == objective_id)
            .cloned()
            .collect())
    }

    async fn latest_checkpoint(&self, workflow_id: &str) -> Result<Option<WorkflowCheckpoint>> {
        let tables = self.tables.read().await;
        Ok(tables.checkpoints.get(workflow_id).and_then(|v| v.last().cloned()))
    }

    async fn list_checkpoints(&self, workflow_id: &str) -> Result<Vec<WorkflowCheckpoint>> {
        let tables = self.tables.read().await;
        Ok(tables.checkpoints.get(workflow_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskflow_core::new_id;

    #[tokio::test]
    async fn upsert_then_get_roundtrips() {
        let store = InMemoryStore::new();
        let objective = Objective::new("investigate northern trade routes");
        store.upsert_objective(&objective).await.unwrap();
        let loaded = store.get_objective(&objective.objective_id).await.unwrap();
        assert_eq!(loaded.title, "investigate northern trade routes");
        let missing = store.get_objective(&new_id()).await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn status_update_requires_existing_row() {
        let store = InMemoryStore::new();
        let err = store.update_objective_status(&new_id(), ObjectiveStatus::Completed, None).await;
        assert!(err.is_err());
    }
}
