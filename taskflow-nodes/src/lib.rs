//! Node handlers, agent plumbing and the canonical graph wirings that turn
//! `taskflow_graph::StateGraph` into an actual workflow (spec.md §4.2,
//! §4.3).

pub mod agent;
pub mod context_analyzer;
pub mod deps;
pub mod error;
pub mod error_handler;
pub mod graphs;
pub mod objective_decomposer;
pub mod processing;
pub mod prompts;
pub mod quality_evaluator;
pub mod research;
pub mod select_next_task;
pub mod step_execution;
pub mod synthesis;
pub mod task_analyzer;

pub use agent::{Agent, AgentContext, AgentMiddleware, AgentRegistry, HttpAgent, LoggingMiddleware};
pub use context_analyzer::ContextAnalyzerNode;
pub use deps::{NodeDeps, NodePolicy};
pub use error::{NodeError, Result};
pub use error_handler::ErrorHandlerNode;
pub use graphs::{build_graph, select_variant, GraphVariant};
pub use objective_decomposer::ObjectiveDecomposerNode;
pub use processing::ProcessingNode;
pub use prompts::PromptTemplate;
pub use quality_evaluator::QualityEvaluatorNode;
pub use research::ResearchNode;
pub use select_next_task::SelectNextTaskNode;
pub use synthesis::SynthesisNode;
pub use task_analyzer::TaskAnalyzerNode;
