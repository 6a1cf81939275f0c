use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use taskflow_core::CoreError;
use taskflow_store::StoreError;

/// Maps the handful of error shapes a handler can produce onto an HTTP
/// response (spec.md §7: "Validation -> 400 ... NotFound -> 404 ...
/// everything else inside a node is internal to the graph"), the rejection
/// idiom `adk-server/src/rest/controllers/runtime.rs` expresses as a bare
/// `(StatusCode, String)` tuple, generalized here to a real error type so
/// every handler shares one `From` chain instead of repeating the mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Core(CoreError::Validation(m)) => (StatusCode::BAD_REQUEST, m.clone()),
            ApiError::Core(CoreError::NotFound(m)) => (StatusCode::NOT_FOUND, m.clone()),
            ApiError::Core(other) => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
            ApiError::Store(StoreError::NotFound(m)) => (StatusCode::NOT_FOUND, m.clone()),
            ApiError::Store(other) => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
