use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use taskflow_core::{ResourceKind, State, Step, TaskStatus};
use taskflow_graph::{Node, NodeContext, NodeOutput, Result as GraphResult};

use crate::deps::NodeDeps;
use crate::error::{NodeError, Result};
use crate::prompts;

#[derive(Deserialize)]
struct PlannedStep {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    step_type: String,
    agent_name: String,
}

#[derive(Deserialize)]
struct PlannedSteps {
    steps: Vec<PlannedStep>,
}

/// spec.md §4.2: for the highest-priority READY task, plans 3-7 steps, seeds
/// them PENDING, flips the first to READY/current_step, task READY -> RUNNING.
pub struct TaskAnalyzerNode {
    deps: NodeDeps,
}

impl TaskAnalyzerNode {
    pub fn new(deps: NodeDeps) -> Self {
        Self { deps }
    }

    async fn plan(&self, state: &mut State) -> Result<()> {
        let task_id = state
            .objective
            .highest_priority_ready_task()
            .map(|t| t.task_id.clone())
            .ok_or_else(|| NodeError::Core(taskflow_core::CoreError::WorkflowStateError(
                "task_analyzer invoked with no READY task".to_string(),
            )))?;

        let (title, description) = {
            let task = state.objective.task_by_id(&task_id).expect("task_id just resolved");
            (task.title.clone(), task.description.clone())
        };

        let guard = self
            .deps
            .resources
            .acquire(ResourceKind::Llm, self.deps.policy.llm_priority, self.deps.policy.llm_timeout)
            .await?;
        let input = json!({ "task_title": title, "task_description": description });
        let response = self.deps.agents.invoke("task_analyzer", &prompts::TASK_ANALYZER, input).await;
        guard.release().await;
        let value = response?;
        let planned: PlannedSteps =
            serde_json::from_value(value).map_err(|e| NodeError::InvalidAgentResponse(e.to_string()))?;

        if planned.steps.is_empty() {
            return Err(NodeError::InvalidAgentResponse("task_analyzer returned zero steps".to_string()));
        }

        let task = state.objective.task_by_id_mut(&task_id).expect("task_id just resolved");
        for planned_step in &planned.steps {
            let step = Step::new(task_id.clone(), planned_step.title.clone(), planned_step.agent_name.clone())
                .with_description(planned_step.description.clone())
                .with_step_type(planned_step.step_type.clone());
            task.add_step(step);
        }
        let first_step_id = task.steps[0].step_id.clone();
        task.steps[0].mark_ready();
        task.mark_running();

        state.current_task = Some(task_id.clone());
        state.current_step = Some(first_step_id);

        self.deps.store.upsert_task(state.objective.task_by_id(&task_id).expect("present")).await?;
        for step in &state.objective.task_by_id(&task_id).expect("present").steps {
            self.deps.store.upsert_step(step).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Node for TaskAnalyzerNode {
    fn name(&self) -> &str {
        "task_analyzer"
    }

    async fn execute(&self, ctx: NodeContext<'_>) -> GraphResult<NodeOutput> {
        let mut state = ctx.state;
        state.mark_node_visited(self.name());

        match self.plan(&mut state).await {
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

    use taskflow_core::{Objective, StepStatus, Task, TaskType};
    use taskflow_graph::ExecutionConfig;
    use taskflow_resources::{ResourceManager, ResourceManagerConfig};
    use taskflow_store::InMemoryStore;

    use crate::agent::test_support::ScriptedAgent;
    use crate::agent::AgentRegistry;
    use crate::deps::NodePolicy;

    fn deps_with(responses: Vec<serde_json::Value>) -> NodeDeps {
        let mut registry = AgentRegistry::new();
        registry.register("task_analyzer", Arc::new(ScriptedAgent::new("task_analyzer", responses)), vec![]);
        NodeDeps {
            agents: Arc::new(registry),
            resources: Arc::new(ResourceManager::new(ResourceManagerConfig::default())),
            store: Arc::new(InMemoryStore::new()),
            policy: NodePolicy::default(),
        }
    }

    #[tokio::test]
    async fn first_step_becomes_ready_task_becomes_running() {
        let response = json!({"steps": [
            {"title": "find primary sources", "agent_name": "research"},
            {"title": "cross check dates", "agent_name": "research"},
        ]});
        let deps = deps_with(vec![response]);
        let node = TaskAnalyzerNode::new(deps);
        let config = ExecutionConfig::new("t1");

        let mut objective = Objective::new("q");
        let mut task = Task::new(objective.objective_id.clone(), "gather sources", TaskType::Research);
        task.mark_ready();
        let task_id = task.task_id.clone();
        objective.add_task(task);
        let state = State::new(objective);

        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();
        assert!(out.state.error.is_none());
        let task = out.state.objective.task_by_id(&task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.steps.len(), 2);
        assert_eq!(task.steps[0].status, StepStatus::Ready);
        assert_eq!(task.steps[1].status, StepStatus::Pending);
        assert_eq!(out.state.current_task, Some(task_id));
        assert_eq!(out.state.current_step, Some(task.steps[0].step_id.clone()));
    }

    #[tokio::test]
    async fn missing_ready_task_is_a_workflow_state_error() {
        let deps = deps_with(vec![]);
        let node = TaskAnalyzerNode::new(deps);
        let config = ExecutionConfig::new("t1");
        let state = State::new(Objective::new("q"));

        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();
        assert_eq!(out.state.error.unwrap().error_type, "WorkflowState");
    }
}
