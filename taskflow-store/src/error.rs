use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        StoreError::Database(value.to_string())
    }
}

impl From<StoreError> for taskflow_core::CoreError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(m) => taskflow_core::CoreError::NotFound(m),
            StoreError::Database(m) => taskflow_core::CoreError::DatabaseError(m),
            StoreError::Serde(e) => taskflow_core::CoreError::Serde(e),
        }
    }
}
