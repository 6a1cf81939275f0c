use async_trait::async_trait;
use taskflow_core::{ObjectiveStatus, State, TaskStatus};
use taskflow_graph::{Node, NodeContext, NodeOutput, Result as GraphResult};

use crate::deps::NodeDeps;
use crate::error::Result;

/// spec.md §4.2: picks the READY task of highest priority whose depends_on
/// is fully COMPLETED; if none is READY and every task is terminal, routes
/// to synthesis; if some tasks are still PENDING awaiting dependencies,
/// routes "wait".
pub struct SelectNextTaskNode {
    deps: NodeDeps,
}

impl SelectNextTaskNode {
    pub fn new(deps: NodeDeps) -> Self {
        Self { deps }
    }

    async fn select(&self, state: &mut State) -> Result<()> {
        if let Some(task) = state.objective.highest_priority_ready_task() {
            state.current_task = Some(task.task_id.clone());
            return Ok(());
        }

        if state.objective.all_tasks_terminal() {
            state.objective.transition(ObjectiveStatus::Synthesizing);
            self.deps.store.upsert_objective(&state.objective).await?;
        }
        Ok(())
    }

    /// The conditional router label for this node (spec.md §4.2): "continue"
    /// when a task was selected, "done" when synthesis should run, "wait"
    /// when some tasks remain PENDING on a dependency.
    pub fn route(state: &State) -> &'static str {
        if state.current_task.is_some() {
            return "continue";
        }
        if state.objective.status == ObjectiveStatus::Synthesizing {
            return "done";
        }
        if state.objective.tasks.iter().any(|t| t.status == TaskStatus::Pending) {
            return "wait";
        }
        "done"
    }
}

#[async_trait]
impl Node for SelectNextTaskNode {
    fn name(&self) -> &str {
        "select_next_task"
    }

    async fn execute(&self, ctx: NodeContext<'_>) -> GraphResult<NodeOutput> {
        let mut state = ctx.state;
        state.mark_node_visited(self.name());

        match self.select(&mut state).await {
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

    use taskflow_core::{Objective, Task, TaskType};
    use taskflow_graph::ExecutionConfig;
    use taskflow_resources::{ResourceManager, ResourceManagerConfig};
    use taskflow_store::InMemoryStore;

    use crate::agent::AgentRegistry;
    use crate::deps::NodePolicy;

    fn deps() -> NodeDeps {
        NodeDeps {
            agents: Arc::new(AgentRegistry::new()),
            resources: Arc::new(ResourceManager::new(ResourceManagerConfig::default())),
            store: Arc::new(InMemoryStore::new()),
            policy: NodePolicy::default(),
        }
    }

    #[tokio::test]
    async fn picks_the_highest_priority_ready_task() {
        let mut objective = Objective::new("q");
        let mut low = Task::new(objective.objective_id.clone(), "low", TaskType::Research).with_priority(1);
        low.mark_ready();
        let mut high = Task::new(objective.objective_id.clone(), "high", TaskType::Research).with_priority(9);
        high.mark_ready();
        let high_id = high.task_id.clone();
        objective.add_task(low);
        objective.add_task(high);

        let state = State::new(objective);
        let node = SelectNextTaskNode::new(deps());
        let config = ExecutionConfig::new("t1");
        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();

        assert_eq!(out.state.current_task, Some(high_id));
        assert_eq!(SelectNextTaskNode::route(&out.state), "continue");
    }

    #[tokio::test]
    async fn all_tasks_terminal_routes_to_synthesis() {
        let mut objective = Objective::new("q");
        let mut task = Task::new(objective.objective_id.clone(), "done", TaskType::Research);
        task.complete(None);
        objective.add_task(task);

        let state = State::new(objective);
        let node = SelectNextTaskNode::new(deps());
        let config = ExecutionConfig::new("t1");
        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();

        assert_eq!(out.state.objective.status, ObjectiveStatus::Synthesizing);
        assert_eq!(SelectNextTaskNode::route(&out.state), "done");
    }

    #[tokio::test]
    async fn pending_task_awaiting_dependency_routes_to_wait() {
        let mut objective = Objective::new("q");
        let mut blocker = Task::new(objective.objective_id.clone(), "blocker", TaskType::Research);
        blocker.mark_running();
        let blocker_id = blocker.task_id.clone();
        let mut waiting = Task::new(objective.objective_id.clone(), "waiting", TaskType::Research);
        waiting.depends_on.insert(blocker_id);
        objective.add_task(blocker);
        objective.add_task(waiting);

        let state = State::new(objective);
        let node = SelectNextTaskNode::new(deps());
        let config = ExecutionConfig::new("t1");
        let out = node.execute(NodeContext { state, config: &config, step: 0 }).await.unwrap();

        assert!(out.state.current_task.is_none());
        assert_eq!(SelectNextTaskNode::route(&out.state), "wait");
    }
}
