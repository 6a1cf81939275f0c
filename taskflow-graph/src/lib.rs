//! A Pregel-style graph engine specialized to `taskflow_core::State`:
//! nodes, routers, checkpoints and a streaming executor (spec.md §4.1).

pub mod checkpoint;
pub mod edge;
pub mod error;
pub mod executor;
pub mod graph;
pub mod node;
pub mod stream;

pub use checkpoint::{Checkpointer, InMemoryCheckpointer};
pub use edge::{END, EdgeTarget, Router, RouterFn, START};
pub use error::{GraphError, Result};
pub use executor::{CancellationSignal, PregelExecutor};
pub use graph::{CompiledGraph, StateGraph};
pub use node::{BoxedNode, ExecutionConfig, FunctionNode, Interrupt, Node, NodeContext, NodeOutput};
pub use stream::StreamEvent;
