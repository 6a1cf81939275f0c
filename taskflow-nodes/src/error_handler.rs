use async_trait::async_trait;
use serde_json::json;
use taskflow_core::{ObjectiveStatus, State};
use taskflow_graph::{Node, NodeContext, NodeOutput, Result as GraphResult};

use crate::deps::NodeDeps;
use crate::error::{NodeError, Result};
use crate::prompts;

/// spec.md §4.2: decision policy over `state.error.error_type` — transient
/// classes (Temporary/Agent/Database) retry the current step up to its
/// budget then skip it; Validation fails the task; everything else aborts
/// the objective. Always clears `state.error` before returning.
pub struct ErrorHandlerNode {
    deps: NodeDeps,
}

impl ErrorHandlerNode {
    pub fn new(deps: NodeDeps) -> Self {
        Self { deps }
    }

    async fn handle(&self, state: &mut State) -> Result<()> {
        let error = state
            .error
            .clone()
            .ok_or_else(|| NodeError::Core(taskflow_core::CoreError::WorkflowStateError(
                "error_handler invoked with no state.error".to_string(),
            )))?;

        // Best-effort diagnosis only: examples/original_source's
        // error_handler.py never lets a failed diagnosis call block the
        // fallback policy below from still producing a decision.
        let _ = self
            .deps
            .agents
            .invoke("error_diagnosis", &prompts::ERROR_DIAGNOSIS, json!({ "error": error.message }))
            .await;

        match error.error_type.as_str() {
            "Temporary" | "Agent" | "Database" => self.retry_or_skip(state).await?,
            "Validation" => self.fail_task(state).await?,
            _ => self.abort(state).await?,
        }
        state.clear_error();
        Ok(())
    }

    async fn retry_or_skip(&self, state: &mut State) -> Result<()> {
        let (task_id, step_id) = match (state.current_task.clone(), state.current_step.clone()) {
            (Some(t), Some(s)) => (t, s),
            _ => return self.restart_workflow(state).await,
        };

        let task = state
            .objective
            .task_by_id_mut(&task_id)
            .ok_or_else(|| NodeError::Core(taskflow_core::CoreError::NotFound(format!("task '{task_id}'"))))?;
        let step = task
            .step_by_id_mut(&step_id)
            .ok_or_else(|| NodeError::Core(taskflow_core::CoreError::NotFound(format!("step '{step_id}'"))))?;

        if step.can_retry() {
            step.retry();
            self.deps.store.upsert_step(step).await?;
        } else {
            step.skip();
            self.deps.store.upsert_step(step).await?;
            crate::step_execution::advance_past_current_step(state, &self.deps).await?;
        }
        Ok(())
    }

    async fn fail_task(&self, state: &mut State) -> Result<()> {
        if let Some(task_id) = state.current_task.clone() {
            if let Some(task) = state.objective.task_by_id_mut(&task_id) {
                task.fail("validation error");
                self.deps.store.upsert_task(task).await?;
            }
        }
        state.current_task = None;
        state.current_step = None;
        Ok(())
    }

    async fn restart_workflow(&self, state: &mut State) -> Result<()> {
        state.objective.transition(ObjectiveStatus::Created);
        state.visited_nodes.clear();
        state.current_task = None;
        state.current_step = None;
        self.deps.store.upsert_objective(&state.objective).await?;
        Ok(())
    }

    async fn abort(&self, state: &mut State) -> Result<()> {
        state.objective.transition(ObjectiveStatus::Failed);
        self.deps.store.upsert_objective(&state.objective).await?;
        Ok(())
    }
}

#[async_trait]
impl Node for ErrorHandlerNode {
    fn name(&self) -> &str {
        "error_handler"
    }

    async fn execute(&self, ctx: NodeContext<'_>) -> GraphResult<NodeOutput> {
        let mut state = ctx.state;
        state.mark_node_visited(self.name());

        if let Err(err) = self.handle(&mut state).await {
            // error_handler itself is the last line of defense; a failure
            // here degrades to an unconditional abort rather than looping.
            tracing::error!(%err, "error_handler itself failed, aborting objective");
            state.objective.transition(ObjectiveStatus::Failed);
            state.clear_error();
        }
        Ok(NodeOutput::new(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use taskflow_core::{Objective, Step, StepStatus, Task, TaskStatus, TaskType};
    use taskflow_graph::ExecutionConfig;
    use taskflow_resources::{ResourceManager, ResourceManagerConfig};
    use taskflow_store::InMemoryStore;

    use crate::agent::test_support::ScriptedAgent;
    use crate::agent::AgentRegistry;
    use crate::deps::NodePolicy;

    fn deps() -> NodeDeps {
        let mut registry = AgentRegistry::new();
        registry.register(
            "error_diagnosis",
            Arc::new(ScriptedAgent::new("error_diagnosis", vec![json!({"diagnosis": "transient"})])),
            vec![],
        );
        NodeDeps {
            agents: Arc::new(registry),
            resources: Arc::new(ResourceManager::new(ResourceManagerConfig::default())),
            store: Arc::new(InMemoryStore::new()),
            policy: NodePolicy::default(),
        }
    }

    fn state_with_step_and_error(error_type: &str) -> (State, String, String) {
        let mut objective = Objective::new("q");
        let mut task = Task::new(objective.objective_id.clone(), "gather sources", TaskType::Research);
        let mut step = Step::new(task.task_id.clone(), "find sources", "research");
        step.mark_running();
        let step_id = step.step_id.clone();
        task.add_step(step);
        task.mark_running();
        let task_id = task.task_id.clone();
        objective.add_task(task);

        let mut state = State::new(objective);
        state.current_task = Some(task_id.clone());
        state.current_step = Some(step_id.clone());
        state.set_error(error_type, "boom", "research");
        (state, task_id, step_id)
    }

    #[tokio::test]
    async fn temporary_error_retries_the_step() {
        let (state, task_id, step_id) = state_with_step_and_error("Temporary");
        let node = ErrorHandlerNode::new(deps());
        let config = ExecutionConfig::new("t1");
        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();

        assert!(out.state.error.is_none());
        let step = out.state.objective.task_by_id(&task_id).unwrap().step_by_id(&step_id).unwrap();
        assert_eq!(step.status, StepStatus::Ready);
        assert_eq!(step.retry_count, 1);
    }

    #[tokio::test]
    async fn temporary_error_past_retry_budget_skips_the_step() {
        let (mut state, task_id, step_id) = state_with_step_and_error("Temporary");
        {
            let task = state.objective.task_by_id_mut(&task_id).unwrap();
            let step = task.step_by_id_mut(&step_id).unwrap();
            step.retry_count = step.max_retries;
        }
        let node = ErrorHandlerNode::new(deps());
        let config = ExecutionConfig::new("t1");
        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();

        assert!(out.state.error.is_none());
        let step = out.state.objective.task_by_id(&task_id).unwrap().step_by_id(&step_id).unwrap();
        assert_eq!(step.status, StepStatus::Skipped);
    }

    #[tokio::test]
    async fn validation_error_fails_the_task() {
        let (state, task_id, _step_id) = state_with_step_and_error("Validation");
        let node = ErrorHandlerNode::new(deps());
        let config = ExecutionConfig::new("t1");
        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();

        assert!(out.state.error.is_none());
        assert_eq!(out.state.objective.task_by_id(&task_id).unwrap().status, TaskStatus::Failed);
        assert!(out.state.current_task.is_none());
    }

    #[tokio::test]
    async fn unrecognized_error_type_aborts_the_objective() {
        let (state, _task_id, _step_id) = state_with_step_and_error("WorkflowState");
        let node = ErrorHandlerNode::new(deps());
        let config = ExecutionConfig::new("t1");
        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();

        assert!(out.state.error.is_none());
        assert_eq!(out.state.objective.status, ObjectiveStatus::Failed);
    }
}
