use async_trait::async_trait;
use serde_json::json;
use taskflow_core::{ContextAnalysis, ObjectiveStatus, ResourceKind, State};
use taskflow_graph::{Node, NodeContext, NodeOutput, Result as GraphResult};

use crate::deps::NodeDeps;
use crate::error::{NodeError, Result};
use crate::prompts;

/// spec.md §4.2: reads the raw query, writes `intermediate_data.context_analysis`,
/// transitions the objective CREATED -> ANALYZING.
pub struct ContextAnalyzerNode {
    deps: NodeDeps,
}

impl ContextAnalyzerNode {
    pub fn new(deps: NodeDeps) -> Self {
        Self { deps }
    }

    async fn analyze(&self, state: &mut State) -> Result<()> {
        let guard = self
            .deps
            .resources
            .acquire(ResourceKind::Llm, self.deps.policy.llm_priority, self.deps.policy.llm_timeout)
            .await?;
        let input = json!({ "query": state.objective.query });
        let response = self.deps.agents.invoke("context_analyzer", &prompts::CONTEXT_ANALYZER, input).await;
        guard.release().await;
        let value = response?;
        let analysis: ContextAnalysis = serde_json::from_value(value)
            .map_err(|e| NodeError::InvalidAgentResponse(e.to_string()))?;
        state.intermediate_data.set_context_analysis(analysis);
        self.deps.store.upsert_objective(&state.objective).await?;
        Ok(())
    }
}

#[async_trait]
impl Node for ContextAnalyzerNode {
    fn name(&self) -> &str {
        "context_analyzer"
    }

    async fn execute(&self, ctx: NodeContext<'_>) -> GraphResult<NodeOutput> {
        let mut state = ctx.state;
        state.mark_node_visited(self.name());
        state.objective.transition(ObjectiveStatus::Analyzing);

        match self.analyze(&mut state).await {
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

    use serde_json::json;
    use taskflow_graph::ExecutionConfig;
    use taskflow_resources::{ResourceManager, ResourceManagerConfig};
    use taskflow_store::InMemoryStore;

    use crate::agent::test_support::ScriptedAgent;
    use crate::agent::AgentRegistry;
    use crate::deps::NodePolicy;

    fn deps_with(responses: Vec<serde_json::Value>) -> NodeDeps {
        let mut registry = AgentRegistry::new();
        registry.register("context_analyzer", Arc::new(ScriptedAgent::new("context_analyzer", responses)), vec![]);
        NodeDeps {
            agents: Arc::new(registry),
            resources: Arc::new(ResourceManager::new(ResourceManagerConfig::default())),
            store: Arc::new(InMemoryStore::new()),
            policy: NodePolicy::default(),
        }
    }

    #[tokio::test]
    async fn writes_context_analysis_and_transitions_to_analyzing() {
        let response = json!({
            "domain": "trade history",
            "secondary_domains": [],
            "key_concepts": ["silk road"],
            "goal_type": "research",
            "region": "asia",
            "time_constraints": null,
            "language": "en",
            "complexity": 3,
            "information_needs": ["primary sources"],
        });
        let deps = deps_with(vec![response]);
        let node = ContextAnalyzerNode::new(deps);
        let config = ExecutionConfig::new("t1");
        let state = State::new(taskflow_core::Objective::new("silk road trade"));

        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();
        assert!(out.state.error.is_none());
        assert_eq!(out.state.objective.status, ObjectiveStatus::Analyzing);
        assert_eq!(out.state.intermediate_data.context_analysis().unwrap().domain, "trade history");
        assert_eq!(out.state.visited_nodes, vec!["context_analyzer".to_string()]);
    }

    #[tokio::test]
    async fn malformed_agent_response_sets_state_error_not_engine_error() {
        let deps = deps_with(vec![json!({"nonsense": true})]);
        let node = ContextAnalyzerNode::new(deps);
        let config = ExecutionConfig::new("t1");
        let state = State::new(taskflow_core::Objective::new("q"));

        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();
        assert!(out.state.error.is_some());
        assert_eq!(out.state.objective.status, ObjectiveStatus::Analyzing);
    }
}
