use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use taskflow_core::{QualityLevel, QualityRoute, ResourceKind, State};
use taskflow_graph::{Node, NodeContext, NodeOutput, Result as GraphResult};

use crate::deps::NodeDeps;
use crate::error::{NodeError, Result};
use crate::prompts;
use crate::step_execution::{advance_past_current_step, restart_task_for_replan};

#[derive(Deserialize)]
struct QualityResponse {
    quality_level: QualityLevel,
}

/// spec.md §4.2: evaluates the just-completed step, sets its
/// `quality_assessment`, and either advances past it (pass), re-readies it
/// for retry (improve), or discards the task's plan (fail).
pub struct QualityEvaluatorNode {
    deps: NodeDeps,
}

impl QualityEvaluatorNode {
    pub fn new(deps: NodeDeps) -> Self {
        Self { deps }
    }

    async fn evaluate(&self, state: &mut State) -> Result<()> {
        let task_id = state
            .current_task
            .clone()
            .ok_or_else(|| NodeError::Core(taskflow_core::CoreError::WorkflowStateError(
                "quality_evaluator invoked with no current_task".to_string(),
            )))?;
        let step_id = state
            .current_step
            .clone()
            .ok_or_else(|| NodeError::Core(taskflow_core::CoreError::WorkflowStateError(
                "quality_evaluator invoked with no current_step".to_string(),
            )))?;

        let output = {
            let task = state
                .objective
                .task_by_id(&task_id)
                .ok_or_else(|| NodeError::Core(taskflow_core::CoreError::NotFound(format!("task '{task_id}'"))))?;
            let step = task
                .step_by_id(&step_id)
                .ok_or_else(|| NodeError::Core(taskflow_core::CoreError::NotFound(format!("step '{step_id}'"))))?;
            step.output_data.clone().unwrap_or(serde_json::Value::Null)
        };

        let guard = self
            .deps
            .resources
            .acquire(ResourceKind::Llm, self.deps.policy.llm_priority, self.deps.policy.llm_timeout)
            .await?;
        let response = self
            .deps
            .agents
            .invoke("quality_evaluator", &prompts::QUALITY_EVALUATOR, json!({ "output": output }))
            .await;
        guard.release().await;
        let value = response?;
        let parsed: QualityResponse =
            serde_json::from_value(value).map_err(|e| NodeError::InvalidAgentResponse(e.to_string()))?;

        {
            let task = state.objective.task_by_id_mut(&task_id).expect("task_id just resolved");
            let step = task.step_by_id_mut(&step_id).expect("step_id just resolved");
            step.quality_assessment = Some(parsed.quality_level);
            self.deps.store.upsert_step(step).await?;
        }

        match parsed.quality_level.route() {
            QualityRoute::Pass => {
                advance_past_current_step(state, &self.deps).await?;
            }
            QualityRoute::Improve => {
                let task = state.objective.task_by_id_mut(&task_id).expect("task_id just resolved");
                let step = task.step_by_id_mut(&step_id).expect("step_id just resolved");
                if step.can_retry() {
                    step.retry();
                    self.deps.store.upsert_step(step).await?;
                    state.intermediate_data.increment_retry_counter(&step_id);
                } else {
                    state.objective.task_by_id_mut(&task_id).expect("present").quality_assessment =
                        Some(QualityLevel::Poor);
                    restart_task_for_replan(state, &self.deps).await?;
                }
            }
            QualityRoute::Fail => {
                state.objective.task_by_id_mut(&task_id).expect("present").quality_assessment =
                    Some(parsed.quality_level);
                restart_task_for_replan(state, &self.deps).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Node for QualityEvaluatorNode {
    fn name(&self) -> &str {
        "quality_evaluator"
    }

    async fn execute(&self, ctx: NodeContext<'_>) -> GraphResult<NodeOutput> {
        let mut state = ctx.state;
        state.mark_node_visited(self.name());

        match self.evaluate(&mut state).await {
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

    use taskflow_core::{Objective, Step, StepStatus, Task, TaskStatus, TaskType};
    use taskflow_graph::{ExecutionConfig, Router};
    use taskflow_resources::{ResourceManager, ResourceManagerConfig};
    use taskflow_store::InMemoryStore;

    use crate::agent::test_support::ScriptedAgent;
    use crate::agent::AgentRegistry;
    use crate::deps::NodePolicy;

    fn deps_with(responses: Vec<serde_json::Value>) -> NodeDeps {
        let mut registry = AgentRegistry::new();
        registry.register("quality_evaluator", Arc::new(ScriptedAgent::new("quality_evaluator", responses)), vec![]);
        NodeDeps {
            agents: Arc::new(registry),
            resources: Arc::new(ResourceManager::new(ResourceManagerConfig::default())),
            store: Arc::new(InMemoryStore::new()),
            policy: NodePolicy::default(),
        }
    }

    fn two_step_task_mid_first_step() -> (Objective, String, String, String) {
        let mut objective = Objective::new("q");
        let mut task = Task::new(objective.objective_id.clone(), "gather sources", TaskType::Research);
        let mut first = Step::new(task.task_id.clone(), "find sources", "research");
        first.complete(json!({"output": "ok"}));
        let second = Step::new(task.task_id.clone(), "verify sources", "research");
        let first_id = first.step_id.clone();
        let second_id = second.step_id.clone();
        task.add_step(first);
        task.add_step(second);
        task.mark_running();
        let task_id = task.task_id.clone();
        objective.add_task(task);
        (objective, task_id, first_id, second_id)
    }

    #[tokio::test]
    async fn pass_advances_to_the_next_pending_step() {
        let (objective, task_id, first_id, second_id) = two_step_task_mid_first_step();
        let mut state = State::new(objective);
        state.current_task = Some(task_id.clone());
        state.current_step = Some(first_id.clone());

        let deps = deps_with(vec![json!({"quality_level": "good"})]);
        let node = QualityEvaluatorNode::new(deps);
        let config = ExecutionConfig::new("t1");
        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();

        assert!(out.state.error.is_none());
        let task = out.state.objective.task_by_id(&task_id).unwrap();
        assert_eq!(task.step_by_id(&first_id).unwrap().quality_assessment, Some(QualityLevel::Good));
        assert_eq!(task.step_by_id(&second_id).unwrap().status, StepStatus::Ready);
        assert_eq!(out.state.current_step, Some(second_id));
        assert_eq!(Router::by_quality()(&out.state), "pass");
    }

    #[tokio::test]
    async fn improve_re_readies_the_same_step_for_retry() {
        let (objective, task_id, first_id, _second_id) = two_step_task_mid_first_step();
        let mut state = State::new(objective);
        state.current_task = Some(task_id.clone());
        state.current_step = Some(first_id.clone());

        let deps = deps_with(vec![json!({"quality_level": "needs_improvement"})]);
        let node = QualityEvaluatorNode::new(deps);
        let config = ExecutionConfig::new("t1");
        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();

        assert!(out.state.error.is_none());
        let task = out.state.objective.task_by_id(&task_id).unwrap();
        let step = task.step_by_id(&first_id).unwrap();
        assert_eq!(step.status, StepStatus::Ready);
        assert_eq!(step.retry_count, 1);
        assert_eq!(out.state.current_step, Some(first_id));
        assert_eq!(Router::by_quality()(&out.state), "improve");
    }

    #[tokio::test]
    async fn fail_discards_the_plan_and_routes_to_task_analyzer() {
        let (objective, task_id, first_id, _second_id) = two_step_task_mid_first_step();
        let mut state = State::new(objective);
        state.current_task = Some(task_id.clone());
        state.current_step = Some(first_id);

        let deps = deps_with(vec![json!({"quality_level": "poor"})]);
        let node = QualityEvaluatorNode::new(deps);
        let config = ExecutionConfig::new("t1");
        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();

        assert!(out.state.error.is_none());
        let task = out.state.objective.task_by_id(&task_id).unwrap();
        assert!(task.steps.is_empty());
        assert_eq!(task.status, TaskStatus::Ready);
        assert!(out.state.current_step.is_none());
        assert_eq!(Router::by_quality()(&out.state), "fail");
    }
}
