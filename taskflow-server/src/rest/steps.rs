use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use taskflow_core::Step;

use crate::core::Core;
use crate::error::ApiResult;

/// `GET /api/v1/steps/{id}`.
pub async fn get_step(State(core): State<Core>, Path(id): Path<String>) -> ApiResult<Json<Step>> {
    Ok(Json(core.store.get_step(&id).await?))
}

/// `GET /api/v1/steps/{id}/results` (spec.md §6). A thin projection of the
/// step onto just its outcome fields, for clients polling for output
/// without wanting the full row.
pub async fn get_step_results(State(core): State<Core>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let step = core.store.get_step(&id).await?;
    Ok(Json(json!({
        "step_id": step.step_id,
        "status": step.status,
        "output_data": step.output_data,
        "error_message": step.error_message,
        "quality_assessment": step.quality_assessment,
    })))
}
