pub mod health;
pub mod objectives;
pub mod scheduler;
pub mod steps;
pub mod stream;
pub mod tasks;
pub mod workflows;

use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::core::Core;

/// Builds the full HTTP surface (spec.md §6). Every handler module above is
/// actually mounted here — deliberately unlike `adk-server/src/rest/mod.rs`,
/// whose `create_app` only wires a bare `/health` route and never mounts
/// the controllers the rest of that crate implements.
pub fn create_app(core: Core) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/multiagent/stream", post(stream::stream_multiagent))
        .route("/api/v1/objectives", post(objectives::create_objective))
        .route("/api/v1/objectives/{id}", get(objectives::get_objective))
        .route("/api/v1/objectives/{id}/tasks", get(objectives::list_tasks))
        .route("/api/v1/objectives/{id}/cancel", post(objectives::cancel_objective))
        .route("/api/v1/tasks/{id}", get(tasks::get_task))
        .route("/api/v1/tasks/{id}/steps", get(tasks::list_steps))
        .route("/api/v1/steps/{id}", get(steps::get_step))
        .route("/api/v1/steps/{id}/results", get(steps::get_step_results))
        .route("/api/v1/workflows/{id}/state", get(workflows::get_workflow_state))
        .route("/api/v1/workflows/{id}/pause", post(workflows::pause_workflow))
        .route("/api/v1/workflows/{id}/resume", post(workflows::resume_workflow))
        .route("/api/v1/workflows/{id}/checkpoints", get(workflows::list_checkpoints))
        .route("/api/v1/workflows/checkpoints/{id}/restore", post(workflows::restore_checkpoint))
        .route("/api/v1/scheduler/status", get(scheduler::scheduler_status))
        .route("/api/v1/scheduler/resources", get(scheduler::scheduler_resources))
        .route("/api/v1/scheduler/steps/schedule", post(scheduler::schedule_step))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(300)))
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024))
        .with_state(core)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn test_core() -> Core {
        let settings = crate::settings::Settings {
            bind_addr: "127.0.0.1:0".to_string(),
            database_url: "sqlite::memory:".to_string(),
            llm_endpoint: "https://example.invalid".to_string(),
            llm_api_key: String::new(),
            search_api_key: None,
            llm_max_concurrent: 10,
            llm_rate_limit: 60,
            database_max_connections: 5,
            worker_max_workers: 4,
            max_steps: 50,
        };
        Core::build(&settings).await.unwrap()
    }

    #[tokio::test]
    async fn health_route_returns_ok() {
        let app = create_app(test_core().await);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_objective_returns_404() {
        let app = create_app(test_core().await);
        let response = app
            .oneshot(Request::builder().uri("/api/v1/objectives/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
