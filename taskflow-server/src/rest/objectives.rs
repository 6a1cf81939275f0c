use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use taskflow_core::{Objective, ObjectiveStatus};

use crate::core::Core;
use crate::error::{ApiError, ApiResult};

#[derive(serde::Deserialize)]
pub struct CreateObjectiveRequest {
    pub query: String,
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// `POST /api/v1/objectives` (spec.md §6). Creates an objective without
/// starting a graph run; `POST /api/v1/multiagent/stream` is what actually
/// executes one. This endpoint exists for clients that want to enqueue work
/// ahead of opening a stream.
pub async fn create_objective(State(core): State<Core>, Json(req): Json<CreateObjectiveRequest>) -> ApiResult<Json<Objective>> {
    if req.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }
    let mut objective = Objective::new(req.query);
    if let Some(priority) = req.priority {
        objective = objective.with_priority(priority);
    }
    if let Some(user_id) = req.user_id {
        objective = objective.with_user_id(user_id);
    }
    core.store.upsert_objective(&objective).await?;
    Ok(Json(objective))
}

/// `GET /api/v1/objectives/{id}`.
pub async fn get_objective(State(core): State<Core>, Path(id): Path<String>) -> ApiResult<Json<Objective>> {
    Ok(Json(core.store.get_objective(&id).await?))
}

/// `GET /api/v1/objectives/{id}/tasks`.
pub async fn list_tasks(State(core): State<Core>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let objective = core.store.get_objective(&id).await?;
    Ok(Json(json!({ "tasks": objective.tasks })))
}

/// `POST /api/v1/objectives/{id}/cancel` (spec.md §5: "on cancel: objective
/// -> CANCELLED, `cancelled` event emitted"). Writes the terminal status to
/// the store and, if a stream is currently attached to this objective,
/// flips its registered `CancellationSignal` (`Core::cancellations`) so the
/// running executor observes it on its next poll and emits `cancelled`
/// itself (spec.md §8 E2E scenario 4). Works equally for an objective with
/// no attached stream, e.g. one paused at an interrupt between turns.
pub async fn cancel_objective(State(core): State<Core>, Path(id): Path<String>) -> ApiResult<Json<Objective>> {
    let mut objective = core.store.get_objective(&id).await?;
    if !objective.status.is_terminal() {
        objective.transition(ObjectiveStatus::Cancelled);
        core.store.upsert_objective(&objective).await?;
        core.cancellations.cancel(&id);
    }
    Ok(Json(objective))
}
