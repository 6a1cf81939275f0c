use thiserror::Error;

/// Error kinds the core distinguishes, shared by the graph engine, the
/// resource pools, the store and the HTTP surface.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Bad input schema, empty query, invalid status transition.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown objective/task/step/workflow/checkpoint.
    #[error("not found: {0}")]
    NotFound(String),

    /// A resource pool could not admit the request at all.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// A resource pool acquisition exceeded its timeout.
    #[error("resource timeout: {0}")]
    ResourceTimeout(String),

    /// The LLM call failed or returned output that could not be parsed.
    #[error("agent error: {0}")]
    AgentError(String),

    /// A store transaction failed and was rolled back.
    #[error("database error: {0}")]
    DatabaseError(String),

    /// An in-memory invariant was violated (e.g. missing current_task).
    #[error("workflow state error: {0}")]
    WorkflowStateError(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Maps an error to the `state.error.type` tag used by the error_handler
    /// decision policy (spec.md §4.2/§7): transient classes share one tag.
    pub fn transient_tag(&self) -> &'static str {
        match self {
            CoreError::ResourceUnavailable(_) | CoreError::ResourceTimeout(_) => "Temporary",
            CoreError::DatabaseError(_) => "Database",
            CoreError::AgentError(_) => "Agent",
            CoreError::Validation(_) => "Validation",
            CoreError::WorkflowStateError(_) => "WorkflowState",
            CoreError::NotFound(_) => "NotFound",
            CoreError::Serde(_) | CoreError::Io(_) => "Internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_tags_match_recovery_classes() {
        assert_eq!(
            CoreError::ResourceTimeout("x".into()).transient_tag(),
            "Temporary"
        );
        assert_eq!(CoreError::Validation("x".into()).transient_tag(), "Validation");
    }
}
