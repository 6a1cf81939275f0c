use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use taskflow_core::Workflow;
use taskflow_graph::Checkpointer;

use crate::core::Core;
use crate::error::{ApiError, ApiResult};

/// `GET /api/v1/workflows/{id}/state` (spec.md §6). Returns the persisted
/// `Workflow` row, whose `serialized_state` is the last state snapshot the
/// graph run wrote on its way through (spec.md §4.4's Persistence
/// Contract).
pub async fn get_workflow_state(State(core): State<Core>, Path(id): Path<String>) -> ApiResult<Json<Workflow>> {
    Ok(Json(core.store.get_workflow(&id).await?))
}

/// `POST /api/v1/workflows/{id}/pause`.
pub async fn pause_workflow(State(core): State<Core>, Path(id): Path<String>) -> ApiResult<Json<Workflow>> {
    let mut workflow = core.store.get_workflow(&id).await?;
    workflow.pause();
    core.store.update_workflow(&workflow).await?;
    Ok(Json(workflow))
}

/// `POST /api/v1/workflows/{id}/resume`.
pub async fn resume_workflow(State(core): State<Core>, Path(id): Path<String>) -> ApiResult<Json<Workflow>> {
    let mut workflow = core.store.get_workflow(&id).await?;
    workflow.resume();
    core.store.update_workflow(&workflow).await?;
    Ok(Json(workflow))
}

/// `GET /api/v1/workflows/{id}/checkpoints`. Checkpoints are served from the
/// in-memory checkpointer the graph executor itself writes to during a run
/// (see `Core::checkpointer`); the `Workflow` row in `taskflow-store` is the
/// durable record, checkpoints are this process's resume log.
pub async fn list_checkpoints(State(core): State<Core>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let checkpoints = core.checkpointer.list(&id).await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(json!({ "checkpoints": checkpoints })))
}

/// `POST /api/v1/workflows/checkpoints/{id}/restore`. Confirms the
/// checkpoint exists and is loadable; the actual resume happens by passing
/// the owning objective's id back into `POST /api/v1/multiagent/stream`,
/// which restarts the run from that objective's latest checkpoint.
pub async fn restore_checkpoint(State(core): State<Core>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let checkpoint = core
        .checkpointer
        .load_by_id(&id)
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
        .ok_or_else(|| ApiError::BadRequest(format!("no checkpoint '{id}'")))?;
    Ok(Json(json!({ "checkpoint": checkpoint })))
}
