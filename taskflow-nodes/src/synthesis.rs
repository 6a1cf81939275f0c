use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use taskflow_core::{ObjectiveStatus, ResourceKind, State, SynthesisResult, TaskStatus};
use taskflow_graph::{Node, NodeContext, NodeOutput, Result as GraphResult};

use crate::deps::NodeDeps;
use crate::error::{NodeError, Result};
use crate::prompts;

#[derive(Deserialize)]
struct SynthesisResponse {
    report: String,
    #[serde(default)]
    sources: Vec<String>,
}

/// spec.md §4.2: reads every COMPLETED task's step outputs, calls the
/// synthesis agent, writes `result_summary`/`synthesis_result`, transitions
/// the objective to COMPLETED.
pub struct SynthesisNode {
    deps: NodeDeps,
}

impl SynthesisNode {
    pub fn new(deps: NodeDeps) -> Self {
        Self { deps }
    }

    async fn synthesize(&self, state: &mut State) -> Result<()> {
        let task_outputs: Vec<serde_json::Value> = state
            .objective
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| {
                json!({
                    "task": t.title,
                    "outputs": t.steps.iter().filter_map(|s| s.output_data.clone()).collect::<Vec<_>>(),
                })
            })
            .collect();

        let guard = self
            .deps
            .resources
            .acquire(ResourceKind::Llm, self.deps.policy.llm_priority, self.deps.policy.llm_timeout)
            .await?;
        let response = self
            .deps
            .agents
            .invoke("synthesis", &prompts::SYNTHESIS, json!({ "task_outputs": task_outputs }))
            .await;
        guard.release().await;
        let value = response?;
        let parsed: SynthesisResponse =
            serde_json::from_value(value).map_err(|e| NodeError::InvalidAgentResponse(e.to_string()))?;

        state.objective.result_summary = Some(parsed.report.clone());
        state.intermediate_data.set_synthesis_result(SynthesisResult {
            report: parsed.report,
            sources: parsed.sources,
            metadata: Default::default(),
        });
        state.objective.transition(ObjectiveStatus::Completed);
        self.deps.store.upsert_objective(&state.objective).await?;
        Ok(())
    }
}

#[async_trait]
impl Node for SynthesisNode {
    fn name(&self) -> &str {
        "synthesis"
    }

    async fn execute(&self, ctx: NodeContext<'_>) -> GraphResult<NodeOutput> {
        let mut state = ctx.state;
        state.mark_node_visited(self.name());

        match self.synthesize(&mut state).await {
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

    use taskflow_core::{Objective, Step, Task, TaskType};
    use taskflow_graph::ExecutionConfig;
    use taskflow_resources::{ResourceManager, ResourceManagerConfig};
    use taskflow_store::InMemoryStore;

    use crate::agent::test_support::ScriptedAgent;
    use crate::agent::AgentRegistry;
    use crate::deps::NodePolicy;

    fn deps_with(responses: Vec<serde_json::Value>) -> NodeDeps {
        let mut registry = AgentRegistry::new();
        registry.register("synthesis", Arc::new(ScriptedAgent::new("synthesis", responses)), vec![]);
        NodeDeps {
            agents: Arc::new(registry),
            resources: Arc::new(ResourceManager::new(ResourceManagerConfig::default())),
            store: Arc::new(InMemoryStore::new()),
            policy: NodePolicy::default(),
        }
    }

    #[tokio::test]
    async fn writes_report_and_completes_the_objective() {
        let mut objective = Objective::new("q");
        let mut task = Task::new(objective.objective_id.clone(), "gather sources", TaskType::Research);
        let mut step = Step::new(task.task_id.clone(), "find sources", "research");
        step.complete(json!({"output": "3 sources found"}));
        task.add_step(step);
        task.complete(None);
        objective.add_task(task);
        objective.transition(ObjectiveStatus::Synthesizing);

        let response = json!({"report": "the silk road connected east and west", "sources": ["src-1"]});
        let deps = deps_with(vec![response]);
        let node = SynthesisNode::new(deps);
        let config = ExecutionConfig::new("t1");
        let out = node.execute(NodeContext { state: State::new(objective), config: &config, step: 0 }).await.unwrap();

        assert!(out.state.error.is_none());
        assert_eq!(out.state.objective.status, ObjectiveStatus::Completed);
        assert!(out.state.objective.completed_at.is_some());
        assert_eq!(out.state.objective.result_summary.as_deref(), Some("the silk road connected east and west"));
        assert_eq!(out.state.intermediate_data.synthesis_result().unwrap().sources, vec!["src-1".to_string()]);
    }
}
