use async_trait::async_trait;
use chrono::{DateTime, Utc};
use taskflow_core::{
    ObjectiveStatus, StepStatus, TaskStatus, Objective, Step, Task, Workflow, WorkflowCheckpoint,
};

use crate::error::Result;

/// A batch of writes belonging to one node transition, committed as a
/// single transaction (spec.md §4.4/§5: "each node's writes are one
/// serializable transaction").
#[derive(Debug, Default)]
pub struct WorkflowMutation {
    pub objective: Option<Objective>,
    pub tasks: Vec<Task>,
    pub steps: Vec<Step>,
    pub workflow: Option<Workflow>,
    pub checkpoint: Option<WorkflowCheckpoint>,
}

impl WorkflowMutation {
    pub fn is_empty(&self) -> bool {
        self.objective.is_none()
            && self.tasks.is_empty()
            && self.steps.is_empty()
            && self.workflow.is_none()
            && self.checkpoint.is_none()
    }
}

/// The Persistence Contract (spec.md §4.4): upsert/update operations over
/// objectives, tasks, steps, workflows and checkpoints, plus the reads
/// needed to reload a workflow.
#[async_trait]
pub trait Store: Send + Sync {
    async fn upsert_objective(&self, objective: &Objective) -> Result<()>;
    async fn upsert_task(&self, task: &Task) -> Result<()>;
    async fn upsert_step(&self, step: &Step) -> Result<()>;
    async fn create_workflow(&self, workflow: &Workflow) -> Result<()>;
    async fn update_workflow(&self, workflow: &Workflow) -> Result<()>;
    async fn create_checkpoint(&self, checkpoint: &WorkflowCheckpoint) -> Result<()>;

    async fn update_objective_status(
        &self,
        id: &str,
        status: ObjectiveStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()>;
    async fn update_task_status(&self, id: &str, status: TaskStatus) -> Result<()>;
    async fn update_step_status(&self, id: &str, status: StepStatus) -> Result<()>;

    /// Applies every write in `mutation` as a single transaction, rolling
    /// back entirely on failure (spec.md §4.4's "a failure inside the
    /// transaction rolls back").
    async fn commit_mutation(&self, mutation: WorkflowMutation) -> Result<()>;

    async fn get_objective(&self, id: &str) -> Result<Objective>;
    async fn get_task(&self, id: &str) -> Result<Task>;
    /// Every task currently in `status`, across all objectives. Backs the
    /// scheduler's RUNNING-task heartbeat sweep (spec.md §4.5); returned
    /// tasks have their `steps` left empty since the sweep never reads them.
    async fn list_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>>;
    async fn get_step(&self, id: &str) -> Result<Step>;
    async fn get_workflow(&self, id: &str) -> Result<Workflow>;
    async fn list_workflows_for_objective(&self, objective_id: &str) -> Result<Vec<Workflow>>;
    async fn latest_checkpoint(&self, workflow_id: &str) -> Result<Option<WorkflowCheckpoint>>;
    async fn list_checkpoints(&self, workflow_id: &str) -> Result<Vec<WorkflowCheckpoint>>;
}
