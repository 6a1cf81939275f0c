use axum::extract::State;
use axum::Json;
use serde_json::Value;
use taskflow_core::Step;

use crate::core::Core;
use crate::error::ApiResult;

/// `GET /api/v1/scheduler/status` (spec.md §6). A snapshot of every pool's
/// accounting, mirroring `ResourceManager::status`'s own per-pool shape.
pub async fn scheduler_status(State(core): State<Core>) -> Json<Value> {
    Json(core.resources.status())
}

/// `GET /api/v1/scheduler/resources`. Same data under a dedicated route for
/// clients that only want resource pool figures, not scheduler metadata.
pub async fn scheduler_resources(State(core): State<Core>) -> Json<Value> {
    Json(core.resources.status())
}

#[derive(serde::Deserialize)]
pub struct ScheduleStepRequest {
    pub step_id: String,
}

/// `POST /api/v1/scheduler/steps/schedule`. Manually re-readies a step
/// outside the normal quality_evaluator/error_handler retry path, e.g. an
/// operator unsticking a step stuck on a transient failure.
pub async fn schedule_step(State(core): State<Core>, Json(req): Json<ScheduleStepRequest>) -> ApiResult<Json<Step>> {
    let mut step = core.store.get_step(&req.step_id).await?;
    step.mark_ready();
    core.store.upsert_step(&step).await?;
    Ok(Json(step))
}
