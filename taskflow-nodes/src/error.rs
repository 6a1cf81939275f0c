use thiserror::Error;

/// Errors a node handler itself cannot recover from (malformed wiring,
/// agent transport failure before a retry policy applies). Everything a
/// node can attribute to the running workflow instead becomes
/// `state.error` and is returned as `Ok` (spec.md §9's `Result{state,
/// error}` mapping) — see `taskflow_graph::NodeOutput`.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("agent call failed: {0}")]
    Agent(String),

    #[error("agent response could not be parsed: {0}")]
    InvalidAgentResponse(String),

    #[error(transparent)]
    Resource(#[from] taskflow_resources::ResourceError),

    #[error(transparent)]
    Store(#[from] taskflow_store::StoreError),

    #[error(transparent)]
    Core(#[from] taskflow_core::CoreError),
}

pub type Result<T> = std::result::Result<T, NodeError>;

impl From<NodeError> for taskflow_core::CoreError {
    fn from(value: NodeError) -> Self {
        match value {
            NodeError::Agent(m) => taskflow_core::CoreError::AgentError(m),
            NodeError::InvalidAgentResponse(m) => taskflow_core::CoreError::AgentError(m),
            NodeError::Resource(e) => e.into(),
            NodeError::Store(e) => e.into(),
            NodeError::Core(e) => e,
        }
    }
}
