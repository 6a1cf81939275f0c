use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("edge target not found: {0}")]
    EdgeTargetNotFound(String),

    #[error("graph has no entry point")]
    NoEntryPoint,

    /// spec.md §4.1: no routing label matched and no default exists.
    #[error("routing error: no label matched for node '{0}'")]
    RoutingError(String),

    /// spec.md §4.1: config.max_steps was reached before a sink node.
    #[error("step budget exceeded after {0} steps")]
    StepBudgetExceeded(usize),

    #[error("node '{node}' failed: {message}")]
    NodeExecutionFailed { node: String, message: String },

    #[error("checkpoint error: {0}")]
    CheckpointError(String),

    /// spec.md §4.1: the engine observed a cancellation signal.
    #[error("execution cancelled at node '{0}'")]
    Cancelled(String),

    #[error(transparent)]
    Core(#[from] taskflow_core::CoreError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;
