use async_trait::async_trait;
use serde_json::{json, Value};
use taskflow_core::{ResourceKind, State};
use taskflow_graph::{Node, NodeContext, NodeOutput, Result as GraphResult};

use crate::deps::NodeDeps;
use crate::error::{NodeError, Result};
use crate::prompts;
use crate::step_execution::complete_current_step_output;

/// spec.md §4.2/§9, REDESIGN FLAGS: executes the current step for RESEARCH/
/// TESTING tasks via the research agent. `step.input_data.sub_queries`, when
/// present, fans out one worker-pool submission per sub-query (bounded by
/// `taskflow_resources::WorkerPool`'s `max_workers`) and awaits the whole
/// batch before handing off to `quality_evaluator`; a step without
/// `sub_queries` still goes through the pool as a single-item batch, so the
/// fan-out path is exercised uniformly rather than being a rarely-hit
/// special case.
pub struct ResearchNode {
    deps: NodeDeps,
}

impl ResearchNode {
    pub fn new(deps: NodeDeps) -> Self {
        Self { deps }
    }

    /// Submits one worker-pool task per sub-query, each acquiring its own
    /// LLM guard and invoking the research agent, and awaits every result
    /// before returning. Grounded in `multiagent_builder.py`'s
    /// `parallel_mode` batching (there capped at 3 tasks per round, executed
    /// one at a time by its own admission); here the batch runs genuinely
    /// concurrently through the worker pool instead of a sequential loop.
    async fn fan_out(&self, title: &str, input_data: &Value, sub_queries: Vec<Value>) -> Result<Vec<Value>> {
        let mut receivers = Vec::with_capacity(sub_queries.len());
        for sub_query in sub_queries {
            let (tx, rx) = tokio::sync::oneshot::channel();
            let agents = self.deps.agents.clone();
            let resources = self.deps.resources.clone();
            let policy = self.deps.policy;
            let title = title.to_string();
            let input_data = input_data.clone();
            let worker = self.deps.resources.worker().clone();

            worker
                .submit(async move {
                    let outcome: std::result::Result<Value, String> = async {
                        let guard = resources
                            .acquire(ResourceKind::Llm, policy.llm_priority, policy.llm_timeout)
                            .await
                            .map_err(|e| e.to_string())?;
                        let response = agents
                            .invoke(
                                "research",
                                &prompts::RESEARCH,
                                json!({ "step_title": title, "input_data": input_data, "sub_query": sub_query }),
                            )
                            .await
                            .map_err(|e| e.to_string());
                        guard.release().await;
                        response
                    }
                    .await;
                    let failed = outcome.is_err();
                    let _ = tx.send(outcome);
                    if failed { Err("research sub-query failed".to_string()) } else { Ok(()) }
                })
                .await?;
            receivers.push(rx);
        }

        let mut outputs = Vec::with_capacity(receivers.len());
        for rx in receivers {
            let outcome = rx
                .await
                .map_err(|_| NodeError::Agent("research worker task dropped its result".to_string()))?;
            outputs.push(outcome.map_err(NodeError::Agent)?);
        }
        Ok(outputs)
    }

    async fn run_step(&self, state: &mut State) -> Result<()> {
        let step = state
            .current_step()
            .ok_or_else(|| NodeError::Core(taskflow_core::CoreError::WorkflowStateError(
                "research invoked with no current_step".to_string(),
            )))?;
        let title = step.title.clone();
        let input_data = step.input_data.clone();

        let sub_queries = match input_data.get("sub_queries").and_then(Value::as_array) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => vec![Value::String(title.clone())],
        };

        let mut outputs = self.fan_out(&title, &input_data, sub_queries).await?;
        let output = if outputs.len() == 1 { outputs.remove(0) } else { json!({ "sub_results": outputs }) };

        complete_current_step_output(state, &self.deps, output).await
    }
}

#[async_trait]
impl Node for ResearchNode {
    fn name(&self) -> &str {
        "research"
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

    use taskflow_core::{Objective, Step, StepStatus, Task, TaskStatus, TaskType};
    use taskflow_graph::ExecutionConfig;
    use taskflow_resources::{ResourceManager, ResourceManagerConfig};
    use taskflow_store::InMemoryStore;

    use crate::agent::test_support::ScriptedAgent;
    use crate::agent::AgentRegistry;
    use crate::deps::NodePolicy;

    fn deps_with(responses: Vec<serde_json::Value>) -> NodeDeps {
        let mut registry = AgentRegistry::new();
        registry.register("research", Arc::new(ScriptedAgent::new("research", responses)), vec![]);
        NodeDeps {
            agents: Arc::new(registry),
            resources: Arc::new(ResourceManager::new(ResourceManagerConfig::default())),
            store: Arc::new(InMemoryStore::new()),
            policy: NodePolicy::default(),
        }
    }

    #[tokio::test]
    async fn completing_a_step_sets_output_but_leaves_current_step_for_quality_evaluator() {
        let mut objective = Objective::new("q");
        let mut task = Task::new(objective.objective_id.clone(), "gather sources", TaskType::Research);
        let mut first = Step::new(task.task_id.clone(), "find sources", "research");
        first.mark_ready();
        let first_id = first.step_id.clone();
        task.add_step(first);
        task.mark_running();
        let task_id = task.task_id.clone();
        objective.add_task(task);

        let mut state = State::new(objective);
        state.current_task = Some(task_id.clone());
        state.current_step = Some(first_id.clone());

        let deps = deps_with(vec![json!({"output": "found 3 sources"})]);
        let node = ResearchNode::new(deps);
        let config = ExecutionConfig::new("t1");
        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();

        assert!(out.state.error.is_none());
        let task = out.state.objective.task_by_id(&task_id).unwrap();
        let step = task.step_by_id(&first_id).unwrap();
        assert_eq!(step.status, StepStatus::Completed);
        assert_eq!(step.output_data, Some(json!({"output": "found 3 sources"})));
        assert_eq!(out.state.current_step, Some(first_id));
        assert_eq!(task.status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn sub_queries_fan_out_through_the_worker_pool_and_batch_into_one_output() {
        let mut objective = Objective::new("q");
        let mut task = Task::new(objective.objective_id.clone(), "gather sources", TaskType::Research);
        let mut first = Step::new(task.task_id.clone(), "find sources", "research")
            .with_input_data(json!({"sub_queries": ["population data", "climate data"]}));
        first.mark_ready();
        let first_id = first.step_id.clone();
        task.add_step(first);
        task.mark_running();
        let task_id = task.task_id.clone();
        objective.add_task(task);

        let mut state = State::new(objective);
        state.current_task = Some(task_id.clone());
        state.current_step = Some(first_id.clone());

        let deps = deps_with(vec![json!({"output": "population result"}), json!({"output": "climate result"})]);
        let node = ResearchNode::new(deps);
        let config = ExecutionConfig::new("t1");
        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();

        assert!(out.state.error.is_none());
        let task = out.state.objective.task_by_id(&task_id).unwrap();
        let step = task.step_by_id(&first_id).unwrap();
        assert_eq!(step.status, StepStatus::Completed);
        let sub_results = step.output_data.as_ref().and_then(|v| v.get("sub_results")).and_then(Value::as_array).unwrap();
        assert_eq!(sub_results.len(), 2);
    }

    #[tokio::test]
    async fn missing_current_step_is_a_workflow_state_error() {
        let deps = deps_with(vec![]);
        let node = ResearchNode::new(deps);
        let config = ExecutionConfig::new("t1");
        let state = State::new(Objective::new("q"));
        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();
        assert_eq!(out.state.error.unwrap().error_type, "WorkflowState");
    }
}
