use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResourceError {
    /// The pool could not admit the request at all (spec.md §4.5).
    #[error("resource unavailable: {0}")]
    Unavailable(String),

    /// Acquisition exceeded its timeout (spec.md §4.5).
    #[error("resource timeout: {0}")]
    Timeout(String),

    #[error("unknown resource kind or api: {0}")]
    UnknownKind(String),
}

pub type Result<T> = std::result::Result<T, ResourceError>;

impl From<ResourceError> for taskflow_core::CoreError {
    fn from(value: ResourceError) -> Self {
        match value {
            ResourceError::Unavailable(m) => taskflow_core::CoreError::ResourceUnavailable(m),
            ResourceError::Timeout(m) => taskflow_core::CoreError::ResourceTimeout(m),
            ResourceError::UnknownKind(m) => taskflow_core::CoreError::Validation(m),
        }
    }
}
