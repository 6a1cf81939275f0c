use async_trait::async_trait;
use serde_json::json;
use taskflow_core::{ResourceKind, State};
use taskflow_graph::{Node, NodeContext, NodeOutput, Result as GraphResult};

use crate::deps::NodeDeps;
use crate::error::{NodeError, Result};
use crate::prompts;
use crate::step_execution::complete_current_step_output;

/// spec.md §4.2: executes the current step for ANALYSIS/DEVELOPMENT/
/// INTEGRATION/DOCUMENTATION/EVALUATION tasks via the processing agent.
pub struct ProcessingNode {
    deps: NodeDeps,
}

impl ProcessingNode {
    pub fn new(deps: NodeDeps) -> Self {
        Self { deps }
    }

    async fn run_step(&self, state: &mut State) -> Result<()> {
        let step = state
            .current_step()
            .ok_or_else(|| NodeError::Core(taskflow_core::CoreError::WorkflowStateError(
                "processing invoked with no current_step".to_string(),
            )))?;
        let title = step.title.clone();
        let input_data = step.input_data.clone();

        let guard = self
            .deps
            .resources
            .acquire(ResourceKind::Llm, self.deps.policy.llm_priority, self.deps.policy.llm_timeout)
            .await?;
        let response = self
            .deps
            .agents
            .invoke("processing", &prompts::PROCESSING, json!({ "step_title": title, "input_data": input_data }))
            .await;
        guard.release().await;
        let output = response?;

        complete_current_step_output(state, &self.deps, output).await
    }
}

#[async_trait]
impl Node for ProcessingNode {
    fn name(&self) -> &str {
        "processing"
    }

    async fn execute(&self, ctx: NodeContext<'_>) -> GraphResult<NodeOutput> {
        let mut state = ctx.state;
        state.mark_node_visited(self.name());

        match self.run_step(&mut state).await {
            Ok(()) => state.clear_error(),
            Err(err) => {
                let core: taskflow_core::CoreError = err.into();
                state.set_error(core.transient_tag(), core.to_string(), self.name());
            }
        }
        Ok(NodeOutput::new(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use taskflow_core::{Objective, Step, StepStatus, Task, TaskType};
    use taskflow_graph::ExecutionConfig;
    use taskflow_resources::{ResourceManager, ResourceManagerConfig};
    use taskflow_store::InMemoryStore;

    use crate::agent::test_support::ScriptedAgent;
    use crate::agent::AgentRegistry;
    use crate::deps::NodePolicy;

    fn deps_with(responses: Vec<serde_json::Value>) -> NodeDeps {
        let mut registry = AgentRegistry::new();
        registry.register("processing", Arc::new(ScriptedAgent::new("processing", responses)), vec![]);
        NodeDeps {
            agents: Arc::new(registry),
            resources: Arc::new(ResourceManager::new(ResourceManagerConfig::default())),
            store: Arc::new(InMemoryStore::new()),
            policy: NodePolicy::default(),
        }
    }

    #[tokio::test]
    async fn missing_current_step_is_a_workflow_state_error() {
        let deps = deps_with(vec![]);
        let node = ProcessingNode::new(deps);
        let config = ExecutionConfig::new("t1");
        let state = State::new(Objective::new("q"));
        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();
        assert_eq!(out.state.error.unwrap().error_type, "WorkflowState");
    }

    #[tokio::test]
    async fn step_output_is_recorded_on_completion() {
        let mut objective = Objective::new("q");
        let mut task = Task::new(objective.objective_id.clone(), "summarize", TaskType::Analysis);
        let mut step = Step::new(task.task_id.clone(), "draft summary", "processing");
        step.mark_ready();
        let step_id = step.step_id.clone();
        task.add_step(step);
        task.mark_running();
        let task_id = task.task_id.clone();
        objective.add_task(task);

        let mut state = State::new(objective);
        state.current_task = Some(task_id.clone());
        state.current_step = Some(step_id.clone());

        let deps = deps_with(vec![json!({"output": "final summary"})]);
        let node = ProcessingNode::new(deps);
        let config = ExecutionConfig::new("t1");
        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();

        assert!(out.state.error.is_none());
        let step = out.state.objective.task_by_id(&task_id).unwrap().step_by_id(&step_id).unwrap();
        assert_eq!(step.status, StepStatus::Completed);
        assert_eq!(step.output_data, Some(json!({"output": "final summary"})));
    }
}
