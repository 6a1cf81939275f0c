use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_stream::stream;
use futures::stream::Stream;
use taskflow_core::{ObjectiveStatus, State};
use tracing::{debug, info, warn};

use crate::edge::EdgeTarget;
use crate::error::{GraphError, Result};
use crate::graph::CompiledGraph;
use crate::node::{ExecutionConfig, NodeContext};
use crate::stream::StreamEvent;

/// A caller-provided cancellation signal, checked at the start of every
/// node (spec.md §4.1/§5).
pub type CancellationSignal = Arc<AtomicBool>;

/// Drives a single `State` value through a [`CompiledGraph`] one node at a
/// time (spec.md §4.1). Node handlers execute strictly sequentially: every
/// graph variant in this domain has at most one pending node at a time
/// outside worker-pool-backed fan-out, which happens inside a node body
/// rather than as multiple concurrently pending graph nodes, so the
/// single-node-per-step loop below satisfies spec.md §5's ordering
/// guarantee by construction.
pub struct PregelExecutor<'a> {
    graph: &'a CompiledGraph,
    config: ExecutionConfig,
}

impl<'a> PregelExecutor<'a> {
    pub fn new(graph: &'a CompiledGraph, config: ExecutionConfig) -> Self {
        Self { graph, config }
    }

    async fn initialize_state(&self, initial_state: State) -> Result<State> {
        if let Some(checkpoint_id) = &self.config.resume_from {
            if let Some(checkpointer) = self.graph.checkpointer() {
                if let Some(checkpoint) = checkpointer.load_by_id(checkpoint_id).await? {
                    info!(checkpoint_id, "resuming workflow from checkpoint");
                    return Ok(State::from_serialized(checkpoint.state)?);
                }
                warn!(checkpoint_id, "resume_from checkpoint not found, starting fresh");
            }
        }
        Ok(initial_state)
    }

    async fn checkpoint(&self, node_name: &str, state: &State) -> Result<()> {
        if let Some(checkpointer) = self.graph.checkpointer() {
            let checkpoint = taskflow_core::WorkflowCheckpoint::new(
                self.config.thread_id.clone(),
                node_name,
                state.to_serialized(),
            );
            checkpointer.save(checkpoint).await?;
        }
        Ok(())
    }

    fn entry_node(&self) -> Result<String> {
        self.graph
            .entry_nodes()
            .into_iter()
            .next()
            .ok_or(GraphError::NoEntryPoint)
    }

    /// spec.md §4.1 routing rule #1: an error on the just-returned state
    /// takes precedence over static/conditional edges.
    fn route(&self, executed: &str, state: &State) -> Result<EdgeTarget> {
        if state.error.is_some() {
            return Ok(EdgeTarget::Node("error_handler".to_string()));
        }
        self.graph.next_target(executed, state)
    }

    /// Runs to completion, returning the terminal `State`. Reaching the
    /// sink node or an observed cancellation both return `Ok` with
    /// `state.objective.status` reflecting the outcome; only genuine
    /// engine defects (step budget, bad routing, a node's own execution
    /// failure) are `Err`.
    pub async fn run(&self, initial_state: State, cancel: Option<CancellationSignal>) -> Result<State> {
        let mut state = self.initialize_state(initial_state).await?;
        let mut current = self.entry_node()?;
        let mut step = 0usize;

        loop {
            if let Some(signal) = &cancel {
                if signal.load(Ordering::Relaxed) {
                    state.objective.transition(ObjectiveStatus::Cancelled);
                    warn!(node = %current, "execution cancelled");
                    return Ok(state);
                }
            }

            if step >= self.config.max_steps {
                return Err(GraphError::StepBudgetExceeded(step));
            }

            let node = self
                .graph
                .node(&current)
                .ok_or_else(|| GraphError::NodeNotFound(current.clone()))?
                .clone();

            debug!(node = %current, step, "executing node");
            let ctx = NodeContext { state, config: &self.config, step };
            let output = node.execute(ctx).await.map_err(|e| match e {
                GraphError::Core(err) => GraphError::NodeExecutionFailed {
                    node: current.clone(),
                    message: err.to_string(),
                },
                other => other,
            })?;
            state = output.state;
            state.mark_node_visited(current.clone());

            self.checkpoint(&current, &state).await?;

            if !self.graph.has_outgoing_edge(&current) {
                return Ok(state);
            }

            let target = self.route(&current, &state)?;
            step += 1;
            match target {
                EdgeTarget::End => return Ok(state),
                EdgeTarget::Node(next) => current = next,
            }
        }
    }

    /// Same loop as [`run`](Self::run), yielding a [`StreamEvent`] after
    /// every node transition (spec.md §4.1's `stream(...)` contract).
    pub fn run_stream(
        self,
        initial_state: State,
        cancel: Option<CancellationSignal>,
    ) -> impl Stream<Item = Result<StreamEvent>> + 'a
    where
        Self: 'a,
    {
        stream! {
            let mut state = match self.initialize_state(initial_state).await {
                Ok(s) => s,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let mut current = match self.entry_node() {
                Ok(n) => n,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let mut step = 0usize;

            loop {
                if let Some(signal) = &cancel {
                    if signal.load(Ordering::Relaxed) {
                        state.objective.transition(ObjectiveStatus::Cancelled);
                        yield Ok(StreamEvent::Cancelled { node: current.clone() });
                        return;
                    }
                }

                if step >= self.config.max_steps {
                    yield Err(GraphError::StepBudgetExceeded(step));
                    return;
                }

                let node = match self.graph.node(&current) {
                    Some(n) => n.clone(),
                    None => {
                        yield Err(GraphError::NodeNotFound(current.clone()));
                        return;
                    }
                };

                let ctx = NodeContext { state, config: &self.config, step };
                let output = match node.execute(ctx).await {
                    Ok(o) => o,
                    Err(e) => {
                        yield Ok(StreamEvent::Error { node: current.clone(), message: e.to_string() });
                        yield Err(e);
                        return;
                    }
                };
                state = output.state;
                state.mark_node_visited(current.clone());

                if self.checkpoint(&current, &state).await.is_err() {
                    yield Err(GraphError::CheckpointError(current.clone()));
                    return;
                }

                if let Some(interrupt) = output.interrupt {
                    yield Ok(StreamEvent::Interrupted {
                        node: current.clone(),
                        message: interrupt.message,
                        options: interrupt.options,
                    });
                    return;
                }

                yield Ok(StreamEvent::Update {
                    node: current.clone(),
                    step,
                    state: state.to_serialized(),
                });

                if !self.graph.has_outgoing_edge(&current) {
                    yield Ok(StreamEvent::Done { total_steps: step, state: state.to_serialized() });
                    return;
                }

                let target = match self.route(&current, &state) {
                    Ok(t) => t,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                step += 1;
                match target {
                    EdgeTarget::End => {
                        yield Ok(StreamEvent::Done { total_steps: step, state: state.to_serialized() });
                        return;
                    }
                    EdgeTarget::Node(next) => current = next,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{Checkpointer, InMemoryCheckpointer};
    use crate::edge::{END, START};
    use crate::graph::StateGraph;
    use crate::node::{Node, NodeOutput};
    use async_trait::async_trait;
    use futures::StreamExt;
    use taskflow_core::Objective;

    struct Increment;

    #[async_trait]
    impl Node for Increment {
        fn name(&self) -> &str {
            "increment"
        }

        async fn execute(&self, ctx: NodeContext<'_>) -> Result<NodeOutput> {
            let mut state = ctx.state;
            state.add_message("system", "incremented");
            Ok(NodeOutput::new(state))
        }
    }

    #[tokio::test]
    async fn sequential_single_node_run_reaches_end() {
        let mut graph = StateGraph::new();
        graph.add_node(Increment);
        graph.add_edge(START, "increment");
        graph.add_edge("increment", END);
        let compiled = graph.compile().unwrap();

        let config = ExecutionConfig::new("thread-1");
        let executor = PregelExecutor::new(&compiled, config);
        let state = executor
            .run(State::new(Objective::new("q")), None)
            .await
            .unwrap();
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.visited_nodes, vec!["increment".to_string()]);
    }

    #[tokio::test]
    async fn step_budget_exceeded_on_tight_loop() {
        let mut graph = StateGraph::new();
        graph.add_node(Increment);
        graph.add_edge(START, "increment");
        graph.add_edge("increment", "increment");
        let compiled = graph.compile().unwrap();

        let config = ExecutionConfig::new("thread-1").with_max_steps(3);
        let executor = PregelExecutor::new(&compiled, config);
        let err = executor
            .run(State::new(Objective::new("q")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::StepBudgetExceeded(_)));
    }

    #[tokio::test]
    async fn cancellation_transitions_objective() {
        let mut graph = StateGraph::new();
        graph.add_node(Increment);
        graph.add_edge(START, "increment");
        graph.add_edge("increment", "increment");
        let compiled = graph.compile().unwrap();

        let config = ExecutionConfig::new("thread-1");
        let cancel: CancellationSignal = Arc::new(AtomicBool::new(true));
        let executor = PregelExecutor::new(&compiled, config);
        let state = executor
            .run(State::new(Objective::new("q")), Some(cancel))
            .await
            .unwrap();
        assert_eq!(state.objective.status, ObjectiveStatus::Cancelled);
    }

    #[tokio::test]
    async fn checkpoint_is_saved_after_each_node() {
        let mut graph = StateGraph::new();
        graph.add_node(Increment);
        graph.add_edge(START, "increment");
        graph.add_edge("increment", END);
        let checkpointer = Arc::new(InMemoryCheckpointer::new());
        let compiled = graph.compile().unwrap().with_checkpointer(checkpointer.clone());

        let config = ExecutionConfig::new("thread-1");
        let executor = PregelExecutor::new(&compiled, config);
        executor.run(State::new(Objective::new("q")), None).await.unwrap();

        let checkpoints = checkpointer.list("thread-1").await.unwrap();
        assert_eq!(checkpoints.len(), 1);
        assert_eq!(checkpoints[0].node_name, "increment");
    }

    #[tokio::test]
    async fn run_stream_emits_update_then_done() {
        let mut graph = StateGraph::new();
        graph.add_node(Increment);
        graph.add_edge(START, "increment");
        graph.add_edge("increment", END);
        let compiled = graph.compile().unwrap();

        let config = ExecutionConfig::new("thread-1");
        let executor = PregelExecutor::new(&compiled, config);
        let events: Vec<_> = executor
            .run_stream(State::new(Objective::new("q")), None)
            .collect()
            .await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].as_ref().unwrap(), StreamEvent::Update { .. }));
        assert!(matches!(events[1].as_ref().unwrap(), StreamEvent::Done { .. }));
    }
}
