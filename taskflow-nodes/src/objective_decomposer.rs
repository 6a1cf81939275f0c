use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use taskflow_core::{ObjectiveStatus, ResourceKind, State, Task, TaskType};
use taskflow_graph::{Node, NodeContext, NodeOutput, Result as GraphResult};

use crate::deps::NodeDeps;
use crate::error::{NodeError, Result};
use crate::prompts;

#[derive(Deserialize)]
struct DecomposedTask {
    title: String,
    #[serde(default)]
    description: String,
    task_type: TaskType,
    #[serde(default)]
    priority: u8,
    #[serde(default)]
    depends_on: Vec<String>,
}

#[derive(Deserialize)]
struct DecomposedTasks {
    tasks: Vec<DecomposedTask>,
}

/// spec.md §4.2: produces tasks with symbolic depends_on (by title), resolves
/// them to task_ids, rejects cycles, seeds PENDING/READY. Transitions
/// ANALYZING -> DECOMPOSING -> PLANNING.
pub struct ObjectiveDecomposerNode {
    deps: NodeDeps,
}

impl ObjectiveDecomposerNode {
    pub fn new(deps: NodeDeps) -> Self {
        Self { deps }
    }

    async fn decompose(&self, state: &mut State) -> Result<()> {
        let guard = self
            .deps
            .resources
            .acquire(ResourceKind::Llm, self.deps.policy.llm_priority, self.deps.policy.llm_timeout)
            .await?;
        let input = json!({
            "query": state.objective.query,
            "context_analysis": state.intermediate_data.context_analysis(),
        });
        let response = self.deps.agents.invoke("objective_decomposer", &prompts::OBJECTIVE_DECOMPOSER, input).await;
        guard.release().await;
        let value = response?;
        let decomposed: DecomposedTasks =
            serde_json::from_value(value).map_err(|e| NodeError::InvalidAgentResponse(e.to_string()))?;

        let mut dependencies_by_title = HashMap::new();
        let mut tasks = Vec::with_capacity(decomposed.tasks.len());
        let mut ids_by_title = HashMap::new();
        for entry in &decomposed.tasks {
            let task = Task::new(state.objective.objective_id.clone(), entry.title.clone(), entry.task_type)
                .with_description(entry.description.clone())
                .with_priority(entry.priority);
            ids_by_title.insert(entry.title.clone(), task.task_id.clone());
            dependencies_by_title.insert(entry.title.clone(), entry.depends_on.clone());
            tasks.push(task);
        }

        for (task, entry) in tasks.iter_mut().zip(&decomposed.tasks) {
            let resolved: std::collections::HashSet<String> = entry
                .depends_on
                .iter()
                .filter_map(|title| ids_by_title.get(title).cloned())
                .collect();
            task.depends_on = resolved;
        }

        if let Err(cyclic) = taskflow_core::validate_acyclic(&tasks) {
            return Err(NodeError::Core(taskflow_core::CoreError::Validation(format!(
                "InvalidDecomposition: cycle through task '{cyclic}'"
            ))));
        }

        state.intermediate_data.set_task_dependencies_by_title(dependencies_by_title);
        for mut task in tasks {
            if task.depends_on.is_empty() {
                task.mark_ready();
            }
            state.objective.add_task(task);
        }

        state.objective.transition(ObjectiveStatus::Decomposing);
        state.objective.transition(ObjectiveStatus::Planning);
        self.deps.store.upsert_objective(&state.objective).await?;
        for task in &state.objective.tasks {
            self.deps.store.upsert_task(task).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Node for ObjectiveDecomposerNode {
    fn name(&self) -> &str {
        "objective_decomposer"
    }

    async fn execute(&self, ctx: NodeContext<'_>) -> GraphResult<NodeOutput> {
        let mut state = ctx.state;
        state.mark_node_visited(self.name());

        match self.decompose(&mut state).await {
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

    use taskflow_core::{Objective, TaskStatus};
    use taskflow_graph::ExecutionConfig;
    use taskflow_resources::{ResourceManager, ResourceManagerConfig};
    use taskflow_store::InMemoryStore;

    use crate::agent::test_support::ScriptedAgent;
    use crate::agent::AgentRegistry;
    use crate::deps::NodePolicy;

    fn deps_with(responses: Vec<serde_json::Value>) -> NodeDeps {
        let mut registry = AgentRegistry::new();
        registry.register(
            "objective_decomposer",
            Arc::new(ScriptedAgent::new("objective_decomposer", responses)),
            vec![],
        );
        NodeDeps {
            agents: Arc::new(registry),
            resources: Arc::new(ResourceManager::new(ResourceManagerConfig::default())),
            store: Arc::new(InMemoryStore::new()),
            policy: NodePolicy::default(),
        }
    }

    #[tokio::test]
    async fn independent_tasks_start_ready_dependent_starts_pending() {
        let response = json!({"tasks": [
            {"title": "gather sources", "task_type": "research", "priority": 5, "depends_on": []},
            {"title": "write summary", "task_type": "documentation", "priority": 3, "depends_on": ["gather sources"]},
        ]});
        let deps = deps_with(vec![response]);
        let node = ObjectiveDecomposerNode::new(deps);
        let config = ExecutionConfig::new("t1");
        let state = State::new(Objective::new("q"));

        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();
        assert!(out.state.error.is_none());
        assert_eq!(out.state.objective.status, ObjectiveStatus::Planning);
        assert_eq!(out.state.objective.tasks.len(), 2);
        let ready = out.state.objective.tasks.iter().find(|t| t.title == "gather sources").unwrap();
        assert_eq!(ready.status, TaskStatus::Ready);
        let pending = out.state.objective.tasks.iter().find(|t| t.title == "write summary").unwrap();
        assert_eq!(pending.status, TaskStatus::Pending);
        assert_eq!(pending.depends_on.len(), 1);
    }

    #[tokio::test]
    async fn cyclic_dependency_is_rejected_as_validation_error() {
        let response = json!({"tasks": [
            {"title": "a", "task_type": "research", "priority": 1, "depends_on": ["b"]},
            {"title": "b", "task_type": "research", "priority": 1, "depends_on": ["a"]},
        ]});
        let deps = deps_with(vec![response]);
        let node = ObjectiveDecomposerNode::new(deps);
        let config = ExecutionConfig::new("t1");
        let state = State::new(Objective::new("q"));

        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();
        let error = out.state.error.unwrap();
        assert_eq!(error.error_type, "Validation");
        assert!(out.state.objective.tasks.is_empty());
    }
}
