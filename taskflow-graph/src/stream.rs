use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The two event kinds `stream()` yields per spec.md §4.1, widened with the
/// control events the rest of §4.1/§4.2/§4.6 require (waiting, interrupted,
/// cancelled, terminal done, node-local error). `taskflow-server` maps these
/// onto the 16-member SSE taxonomy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A node finished; payload is the new State (or a diff view of it).
    Update { node: String, step: usize, state: Value },
    /// An agent produced a streaming chunk while a node was executing.
    Message { node: String, chunk: String, is_final: bool },
    /// select_next_task found no READY task but some are still PENDING.
    Waiting { node: String },
    /// A node raised an interrupt awaiting a human decision.
    Interrupted { node: String, message: String, options: Vec<String> },
    /// A cancellation signal was observed.
    Cancelled { node: String },
    /// The sink node was reached.
    Done { total_steps: usize, state: Value },
    /// A node-local, unrecoverable failure (distinct from a routed
    /// `state.error`, which never reaches the stream as its own event).
    Error { node: String, message: String },
}
