use std::sync::Arc;

use taskflow_core::{ObjectiveStatus, QualityRoute, State};
use taskflow_graph::{
    CompiledGraph, EdgeTarget, FunctionNode, Node, NodeOutput, Result as GraphResult, Router, StateGraph, END, START,
};

use crate::context_analyzer::ContextAnalyzerNode;
use crate::deps::NodeDeps;
use crate::error_handler::ErrorHandlerNode;
use crate::objective_decomposer::ObjectiveDecomposerNode;
use crate::processing::ProcessingNode;
use crate::quality_evaluator::QualityEvaluatorNode;
use crate::research::ResearchNode;
use crate::select_next_task::SelectNextTaskNode;
use crate::synthesis::SynthesisNode;
use crate::task_analyzer::TaskAnalyzerNode;

/// spec.md §4.3: the four canonical graph shapes, differing only in which
/// execution node(s) exist and how they're wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphVariant {
    Research,
    Analysis,
    Executor,
    Multiagent,
}

/// spec.md §4.2 point 1: every node marks itself visited; `initialize` has
/// no other responsibility beyond being the graph's single entry point.
fn build_initialize_node() -> impl Node {
    FunctionNode::new("initialize", |ctx: taskflow_graph::NodeContext<'_>| async move {
        let mut state = ctx.state;
        state.mark_node_visited("initialize");
        Ok::<_, taskflow_graph::GraphError>(NodeOutput::new(state))
    })
}

/// spec.md §4.2's select_next_task router, exposed as a `RouterFn`.
fn select_next_task_router() -> taskflow_graph::RouterFn {
    Arc::new(|state: &State| SelectNextTaskNode::route(state).to_string())
}

fn error_handler_router_single() -> taskflow_graph::RouterFn {
    Arc::new(|state: &State| {
        if state.objective.status == ObjectiveStatus::Failed {
            "end".to_string()
        } else if state.objective.status == ObjectiveStatus::Created {
            "restart".to_string()
        } else if state.current_task.is_none() {
            "select".to_string()
        } else {
            "retry".to_string()
        }
    })
}

fn error_handler_router_dual() -> taskflow_graph::RouterFn {
    Arc::new(|state: &State| {
        if state.objective.status == ObjectiveStatus::Failed {
            "end".to_string()
        } else if state.objective.status == ObjectiveStatus::Created {
            "restart".to_string()
        } else if state.current_task.is_none() {
            "select".to_string()
        } else if state.current_task().map(|t| t.task_type.routes_to_research()).unwrap_or(true) {
            "retry_research".to_string()
        } else {
            "retry_processing".to_string()
        }
    })
}

fn quality_router_single() -> taskflow_graph::RouterFn {
    Arc::new(Router::by_quality())
}

fn quality_router_dual() -> taskflow_graph::RouterFn {
    Arc::new(|state: &State| {
        let level = state
            .current_step()
            .and_then(|s| s.quality_assessment)
            .or_else(|| state.current_task().and_then(|t| t.quality_assessment));
        match level.map(|l| l.route()) {
            Some(QualityRoute::Improve) => {
                if state.current_task().map(|t| t.task_type.routes_to_research()).unwrap_or(true) {
                    "improve_research".to_string()
                } else {
                    "improve_processing".to_string()
                }
            }
            Some(QualityRoute::Fail) => "fail".to_string(),
            _ => "pass".to_string(),
        }
    })
}

/// Wires the research-only graph (spec.md §4.3): `initialize ->
/// context_analyzer -> objective_decomposer -> task_analyzer -> research ->
/// quality_evaluator -> {select_next_task, research, task_analyzer} ->
/// synthesis -> END`.
fn build_research_graph(deps: &NodeDeps) -> GraphResult<CompiledGraph> {
    let mut graph = StateGraph::new();
    graph.add_node(build_initialize_node());
    graph.add_node(ContextAnalyzerNode::new(deps.clone()));
    graph.add_node(ObjectiveDecomposerNode::new(deps.clone()));
    graph.add_node(TaskAnalyzerNode::new(deps.clone()));
    graph.add_node(ResearchNode::new(deps.clone()));
    graph.add_node(QualityEvaluatorNode::new(deps.clone()));
    graph.add_node(SelectNextTaskNode::new(deps.clone()));
    graph.add_node(SynthesisNode::new(deps.clone()));
    graph.add_node(ErrorHandlerNode::new(deps.clone()));

    graph.add_edge(START, "initialize");
    graph.add_edge("initialize", "context_analyzer");
    graph.add_edge("context_analyzer", "objective_decomposer");
    graph.add_edge("objective_decomposer", "task_analyzer");
    graph.add_edge("task_analyzer", "research");
    graph.add_edge("research", "quality_evaluator");
    graph.add_conditional_edges(
        "quality_evaluator",
        quality_router_single(),
        [
            ("pass".to_string(), EdgeTarget::from("select_next_task")),
            ("improve".to_string(), EdgeTarget::from("research")),
            ("fail".to_string(), EdgeTarget::from("task_analyzer")),
        ]
        .into_iter()
        .collect(),
        None,
    );
    graph.add_conditional_edges(
        "select_next_task",
        select_next_task_router(),
        [
            ("continue".to_string(), EdgeTarget::from("task_analyzer")),
            ("wait".to_string(), EdgeTarget::from("select_next_task")),
            ("done".to_string(), EdgeTarget::from("synthesis")),
        ]
        .into_iter()
        .collect(),
        None,
    );
    graph.add_edge("synthesis", END);
    graph.add_conditional_edges(
        "error_handler",
        error_handler_router_single(),
        [
            ("end".to_string(), EdgeTarget::End),
            ("restart".to_string(), EdgeTarget::from("context_analyzer")),
            ("select".to_string(), EdgeTarget::from("select_next_task")),
            ("retry".to_string(), EdgeTarget::from("research")),
        ]
        .into_iter()
        .collect(),
        None,
    );

    graph.compile()
}

/// Identical to the research graph with `processing` in place of `research`.
fn build_analysis_graph(deps: &NodeDeps) -> GraphResult<CompiledGraph> {
    let mut graph = StateGraph::new();
    graph.add_node(build_initialize_node());
    graph.add_node(ContextAnalyzerNode::new(deps.clone()));
    graph.add_node(ObjectiveDecomposerNode::new(deps.clone()));
    graph.add_node(TaskAnalyzerNode::new(deps.clone()));
    graph.add_node(ProcessingNode::new(deps.clone()));
    graph.add_node(QualityEvaluatorNode::new(deps.clone()));
    graph.add_node(SelectNextTaskNode::new(deps.clone()));
    graph.add_node(SynthesisNode::new(deps.clone()));
    graph.add_node(ErrorHandlerNode::new(deps.clone()));

    graph.add_edge(START, "initialize");
    graph.add_edge("initialize", "context_analyzer");
    graph.add_edge("context_analyzer", "objective_decomposer");
    graph.add_edge("objective_decomposer", "task_analyzer");
    graph.add_edge("task_analyzer", "processing");
    graph.add_edge("processing", "quality_evaluator");
    graph.add_conditional_edges(
        "quality_evaluator",
        quality_router_single(),
        [
            ("pass".to_string(), EdgeTarget::from("select_next_task")),
            ("improve".to_string(), EdgeTarget::from("processing")),
            ("fail".to_string(), EdgeTarget::from("task_analyzer")),
        ]
        .into_iter()
        .collect(),
        None,
    );
    graph.add_conditional_edges(
        "select_next_task",
        select_next_task_router(),
        [
            ("continue".to_string(), EdgeTarget::from("task_analyzer")),
            ("wait".to_string(), EdgeTarget::from("select_next_task")),
            ("done".to_string(), EdgeTarget::from("synthesis")),
        ]
        .into_iter()
        .collect(),
        None,
    );
    graph.add_edge("synthesis", END);
    graph.add_conditional_edges(
        "error_handler",
        error_handler_router_single(),
        [
            ("end".to_string(), EdgeTarget::End),
            ("restart".to_string(), EdgeTarget::from("context_analyzer")),
            ("select".to_string(), EdgeTarget::from("select_next_task")),
            ("retry".to_string(), EdgeTarget::from("processing")),
        ]
        .into_iter()
        .collect(),
        None,
    );

    graph.compile()
}

/// The general graph: both `research` and `processing` exist, dispatched by
/// `task_type` (spec.md §4.3's executor graph). The `multiagent` variant
/// reuses this wiring; it additionally annotates `state.current_node` and
/// gets per-node SSE emission from the streaming controller, not from the
/// graph shape itself.
fn build_dual_graph(deps: &NodeDeps) -> GraphResult<CompiledGraph> {
    let mut graph = StateGraph::new();
    graph.add_node(build_initialize_node());
    graph.add_node(ContextAnalyzerNode::new(deps.clone()));
    graph.add_node(ObjectiveDecomposerNode::new(deps.clone()));
    graph.add_node(TaskAnalyzerNode::new(deps.clone()));
    graph.add_node(ResearchNode::new(deps.clone()));
    graph.add_node(ProcessingNode::new(deps.clone()));
    graph.add_node(QualityEvaluatorNode::new(deps.clone()));
    graph.add_node(SelectNextTaskNode::new(deps.clone()));
    graph.add_node(SynthesisNode::new(deps.clone()));
    graph.add_node(ErrorHandlerNode::new(deps.clone()));

    graph.add_edge(START, "initialize");
    graph.add_edge("initialize", "context_analyzer");
    graph.add_edge("context_analyzer", "objective_decomposer");
    graph.add_edge("objective_decomposer", "task_analyzer");
    graph.add_conditional_edges(
        "task_analyzer",
        Arc::new(Router::by_task_type()),
        [
            ("research".to_string(), EdgeTarget::from("research")),
            ("processing".to_string(), EdgeTarget::from("processing")),
        ]
        .into_iter()
        .collect(),
        None,
    );
    graph.add_edge("research", "quality_evaluator");
    graph.add_edge("processing", "quality_evaluator");
    graph.add_conditional_edges(
        "quality_evaluator",
        quality_router_dual(),
        [
            ("pass".to_string(), EdgeTarget::from("select_next_task")),
            ("improve_research".to_string(), EdgeTarget::from("research")),
            ("improve_processing".to_string(), EdgeTarget::from("processing")),
            ("fail".to_string(), EdgeTarget::from("task_analyzer")),
        ]
        .into_iter()
        .collect(),
        None,
    );
    graph.add_conditional_edges(
        "select_next_task",
        select_next_task_router(),
        [
            ("continue".to_string(), EdgeTarget::from("task_analyzer")),
            ("wait".to_string(), EdgeTarget::from("select_next_task")),
            ("done".to_string(), EdgeTarget::from("synthesis")),
        ]
        .into_iter()
        .collect(),
        None,
    );
    graph.add_edge("synthesis", END);
    graph.add_conditional_edges(
        "error_handler",
        error_handler_router_dual(),
        [
            ("end".to_string(), EdgeTarget::End),
            ("restart".to_string(), EdgeTarget::from("context_analyzer")),
            ("select".to_string(), EdgeTarget::from("select_next_task")),
            ("retry_research".to_string(), EdgeTarget::from("research")),
            ("retry_processing".to_string(), EdgeTarget::from("processing")),
        ]
        .into_iter()
        .collect(),
        None,
    );

    graph.compile()
}

pub fn build_graph(variant: GraphVariant, deps: &NodeDeps) -> GraphResult<CompiledGraph> {
    match variant {
        GraphVariant::Research => build_research_graph(deps),
        GraphVariant::Analysis => build_analysis_graph(deps),
        GraphVariant::Executor | GraphVariant::Multiagent => build_dual_graph(deps),
    }
}

/// spec.md §4.3: a keyword heuristic selects a variant; documented as
/// non-normative, deterministic given the same query.
pub fn select_variant(query: &str) -> GraphVariant {
    let lowered = query.to_lowercase();
    if ["multi-agent", "multiagent", "collaborate", "team of agents"]
        .iter()
        .any(|kw| lowered.contains(kw))
    {
        GraphVariant::Multiagent
    } else if ["build", "develop", "implement", "integrate", "deploy"]
        .iter()
        .any(|kw| lowered.contains(kw))
    {
        GraphVariant::Executor
    } else if ["analyze", "analysis", "evaluate", "compare"].iter().any(|kw| lowered.contains(kw)) {
        GraphVariant::Analysis
    } else {
        GraphVariant::Research
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_is_deterministic_for_the_same_query() {
        let query = "analyze the regional trade data";
        assert_eq!(select_variant(query), select_variant(query));
        assert_eq!(select_variant(query), GraphVariant::Analysis);
    }

    #[test]
    fn factory_picks_executor_for_build_keywords() {
        assert_eq!(select_variant("build a deployment pipeline"), GraphVariant::Executor);
    }

    #[test]
    fn factory_defaults_to_research() {
        assert_eq!(select_variant("what happened during the bronze age collapse"), GraphVariant::Research);
    }
}
