use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use taskflow_core::State;

use crate::checkpoint::Checkpointer;
use crate::edge::{END, Edge, EdgeTarget, RouterFn, START};
use crate::error::{GraphError, Result};
use crate::node::{BoxedNode, Node};

/// Builds a statically declared directed graph: vertices are nodes, edges
/// are unconditional or guarded by a routing function (spec.md §4.1).
#[derive(Default)]
pub struct StateGraph {
    nodes: HashMap<String, BoxedNode>,
    edges: Vec<Edge>,
}

impl StateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: impl Node + 'static) -> &mut Self {
        let name = node.name().to_string();
        self.nodes.insert(name, Arc::new(node));
        self
    }

    pub fn add_node_arc(&mut self, node: BoxedNode) -> &mut Self {
        self.nodes.insert(node.name().to_string(), node);
        self
    }

    /// An edge from `START` accumulates into the graph's single `Entry`
    /// edge rather than becoming its own `Direct` edge.
    pub fn add_edge(&mut self, source: &str, target: &str) -> &mut Self {
        if source == START {
            match self.edges.iter_mut().find(|e| matches!(e, Edge::Entry { .. })) {
                Some(Edge::Entry { targets }) => targets.push(target.to_string()),
                _ => self.edges.push(Edge::Entry { targets: vec![target.to_string()] }),
            }
        } else {
            self.edges.push(Edge::Direct {
                source: source.to_string(),
                target: EdgeTarget::from(target),
            });
        }
        self
    }

    pub fn add_conditional_edges(
        &mut self,
        source: &str,
        router: RouterFn,
        targets: HashMap<String, EdgeTarget>,
        default: Option<EdgeTarget>,
    ) -> &mut Self {
        self.edges.push(Edge::Conditional {
            source: source.to_string(),
            router,
            targets,
            default,
        });
        self
    }

    /// spec.md §4.1 `build`: validates every referenced node exists and at
    /// least one entry point is declared. Fails with `GraphValidationError`
    /// (here `GraphError::{NoEntryPoint,NodeNotFound,EdgeTargetNotFound}`).
    pub fn compile(self) -> Result<CompiledGraph> {
        self.validate()?;
        Ok(CompiledGraph {
            nodes: self.nodes,
            edges: self.edges,
            checkpointer: None,
            max_steps: 50,
        })
    }

    fn validate(&self) -> Result<()> {
        let has_entry = self.edges.iter().any(|e| matches!(e, Edge::Entry { .. }));
        if !has_entry {
            return Err(GraphError::NoEntryPoint);
        }

        for edge in &self.edges {
            match edge {
                Edge::Direct { source, target } => {
                    self.require_node(source)?;
                    self.require_target(target)?;
                }
                Edge::Conditional { source, targets, default, .. } => {
                    self.require_node(source)?;
                    for target in targets.values() {
                        self.require_target(target)?;
                    }
                    if let Some(default) = default {
                        self.require_target(default)?;
                    }
                }
                Edge::Entry { targets } => {
                    for target in targets {
                        self.require_node(target)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn require_node(&self, name: &str) -> Result<()> {
        if self.nodes.contains_key(name) {
            Ok(())
        } else {
            Err(GraphError::NodeNotFound(name.to_string()))
        }
    }

    fn require_target(&self, target: &EdgeTarget) -> Result<()> {
        match target {
            EdgeTarget::End => Ok(()),
            EdgeTarget::Node(name) => {
                if self.nodes.contains_key(name) {
                    Ok(())
                } else {
                    Err(GraphError::EdgeTargetNotFound(name.clone()))
                }
            }
        }
    }
}

pub struct CompiledGraph {
    pub(crate) nodes: HashMap<String, BoxedNode>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) checkpointer: Option<Arc<dyn Checkpointer>>,
    pub(crate) max_steps: usize,
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("edges", &self.edges)
            .field("has_checkpointer", &self.checkpointer.is_some())
            .field("max_steps", &self.max_steps)
            .finish()
    }
}

impl CompiledGraph {
    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn Checkpointer>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn checkpointer(&self) -> Option<&Arc<dyn Checkpointer>> {
        self.checkpointer.as_ref()
    }

    pub fn node(&self, name: &str) -> Option<&BoxedNode> {
        self.nodes.get(name)
    }

    pub fn entry_nodes(&self) -> Vec<String> {
        self.edges
            .iter()
            .find_map(|e| match e {
                Edge::Entry { targets } => Some(targets.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// spec.md §4.1 routing semantics, evaluated for the node that just ran.
    /// Rule #1 (error takes precedence) is applied by the caller
    /// ([`crate::executor::PregelExecutor`]) before this is consulted.
    pub fn next_target(&self, executed: &str, state: &State) -> Result<EdgeTarget> {
        for edge in &self.edges {
            match edge {
                Edge::Direct { source, target } if source == executed => {
                    return Ok(target.clone());
                }
                Edge::Conditional { source, router, targets, default } if source == executed => {
                    let label = router(state);
                    if let Some(target) = targets.get(&label) {
                        return Ok(target.clone());
                    }
                    if let Some(default) = default {
                        return Ok(default.clone());
                    }
                    return Err(GraphError::RoutingError(executed.to_string()));
                }
                _ => {}
            }
        }
        Err(GraphError::EdgeTargetNotFound(format!("no outgoing edge for '{executed}'")))
    }

    pub fn has_outgoing_edge(&self, node: &str) -> bool {
        self.edges.iter().any(|e| match e {
            Edge::Direct { source, .. } | Edge::Conditional { source, .. } => source == node,
            Edge::Entry { .. } => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ExecutionConfig, NodeContext, NodeOutput};
    use async_trait::async_trait;
    use taskflow_core::Objective;

    struct Noop(&'static str);

    #[async_trait]
    impl Node for Noop {
        fn name(&self) -> &str {
            self.0
        }

        async fn execute(&self, ctx: NodeContext<'_>) -> Result<NodeOutput> {
            Ok(NodeOutput::new(ctx.state))
        }
    }

    #[test]
    fn missing_entry_point_fails_validation() {
        let mut graph = StateGraph::new();
        graph.add_node(Noop("a"));
        let err = graph.compile().unwrap_err();
        assert!(matches!(err, GraphError::NoEntryPoint));
    }

    #[test]
    fn missing_node_fails_validation() {
        let mut graph = StateGraph::new();
        graph.add_node(Noop("a"));
        graph.add_edge(START, "a");
        graph.add_edge("a", "missing");
        let err = graph.compile().unwrap_err();
        assert!(matches!(err, GraphError::EdgeTargetNotFound(_)));
    }

    #[test]
    fn basic_graph_compiles() {
        let mut graph = StateGraph::new();
        graph.add_node(Noop("a"));
        graph.add_edge(START, "a");
        graph.add_edge("a", END);
        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.entry_nodes(), vec!["a".to_string()]);
        let state = State::new(Objective::new("q"));
        let target = compiled.next_target("a", &state).unwrap();
        assert!(target.is_end());
    }

    #[test]
    fn conditional_routing_without_default_errors_on_unmatched_label() {
        let mut graph = StateGraph::new();
        graph.add_node(Noop("a"));
        graph.add_node(Noop("b"));
        graph.add_edge(START, "a");
        let router: RouterFn = Arc::new(|_: &State| "unmatched".to_string());
        let mut targets = HashMap::new();
        targets.insert("ok".to_string(), EdgeTarget::Node("b".to_string()));
        graph.add_conditional_edges("a", router, targets, None);
        let compiled = graph.compile().unwrap();
        let state = State::new(Objective::new("q"));
        let err = compiled.next_target("a", &state).unwrap_err();
        assert!(matches!(err, GraphError::RoutingError(_)));
    }
}
