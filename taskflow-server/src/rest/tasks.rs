use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use taskflow_core::Task;

use crate::core::Core;
use crate::error::ApiResult;

/// `GET /api/v1/tasks/{id}`.
pub async fn get_task(State(core): State<Core>, Path(id): Path<String>) -> ApiResult<Json<Task>> {
    Ok(Json(core.store.get_task(&id).await?))
}

/// `GET /api/v1/tasks/{id}/steps`.
pub async fn list_steps(State(core): State<Core>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let task = core.store.get_task(&id).await?;
    Ok(Json(json!({ "steps": task.steps })))
}
