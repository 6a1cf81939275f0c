use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use taskflow_core::{State, new_id};

use crate::error::GraphError;

/// A human-decision interrupt raised by a node (spec.md §4.6 "Interrupts").
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Interrupt {
    pub message: String,
    pub options: Vec<String>,
    pub data: Value,
}

impl Interrupt {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            options: Vec::new(),
            data: Value::Null,
        }
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub thread_id: String,
    pub resume_from: Option<String>,
    /// spec.md §4.1: a step counter bounded by config.max_steps.
    pub max_steps: usize,
    pub metadata: HashMap<String, Value>,
}

impl ExecutionConfig {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            resume_from: None,
            max_steps: 50,
            metadata: HashMap::new(),
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_resume_from(mut self, checkpoint_id: impl Into<String>) -> Self {
        self.resume_from = Some(checkpoint_id.into());
        self
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self::new(new_id())
    }
}

/// The single input every node contract receives (spec.md §4.2: `async
/// (state) -> state`).
pub struct NodeContext<'a> {
    pub state: State,
    pub config: &'a ExecutionConfig,
    pub step: usize,
}

/// What a node hands back to the engine. `state` is the full mutated value
/// (Design Note §9's `Result{state, error}`: a node that fails sets
/// `state.error` rather than returning `Err` — `Err` is reserved for
/// defects in the node itself, e.g. a malformed graph wiring).
pub struct NodeOutput {
    pub state: State,
    pub interrupt: Option<Interrupt>,
}

impl NodeOutput {
    pub fn new(state: State) -> Self {
        Self { state, interrupt: None }
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = Some(interrupt);
        self
    }
}

#[async_trait]
pub trait Node: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, ctx: NodeContext<'_>) -> Result<NodeOutput, GraphError>;
}

pub type BoxedNode = Arc<dyn Node>;

/// Wraps a plain async closure into a [`Node`], for graph-variant wiring and
/// tests (mirrors the teacher's `FunctionNode`).
pub struct FunctionNode<F> {
    name: String,
    func: F,
}

impl<F> FunctionNode<F> {
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self { name: name.into(), func }
    }
}

#[async_trait]
impl<F, Fut> Node for FunctionNode<F>
where
    F: Fn(NodeContext<'_>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<NodeOutput, GraphError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: NodeContext<'_>) -> Result<NodeOutput, GraphError> {
        (self.func)(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskflow_core::Objective;

    #[tokio::test]
    async fn function_node_runs_closure() {
        let node = FunctionNode::new("noop", |ctx: NodeContext<'_>| async move {
            Ok(NodeOutput::new(ctx.state))
        });
        let config = ExecutionConfig::new("t1");
        let state = State::new(Objective::new("q"));
        let out = node
            .execute(NodeContext { state, config: &config, step: 0 })
            .await
            .unwrap();
        assert_eq!(out.state.objective.query, "q");
    }
}
