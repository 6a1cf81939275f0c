use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State as AxumState;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use taskflow_core::{new_id, Objective, State as WorkflowState, Workflow, WorkflowType};
use taskflow_graph::{CancellationSignal, Checkpointer, ExecutionConfig, PregelExecutor};
use taskflow_nodes::{build_graph, select_variant, GraphVariant};

use crate::cancellation::CancellationRegistry;
use crate::core::Core;
use crate::events::{translate, ApiEvent, EntityTracker};
use crate::progress::ProgressTracker;

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Body of `POST /api/v1/multiagent/stream` (spec.md §6): `{messages,
/// thread_id, locale, max_steps, auto_execute, interrupt_feedback,
/// additional_context}`. `thread_id` absent starts a fresh objective seeded
/// from the last user message in `messages`; present, it resumes that
/// objective's latest checkpoint.
#[derive(Debug, Deserialize)]
pub struct StreamRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub max_steps: Option<usize>,
    #[serde(default = "default_auto_execute")]
    pub auto_execute: bool,
    #[serde(default)]
    pub interrupt_feedback: Option<Value>,
    #[serde(default)]
    pub additional_context: Option<Value>,
}

fn default_auto_execute() -> bool {
    true
}

impl StreamRequest {
    fn query(&self) -> String {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

fn workflow_type_for(variant: GraphVariant) -> WorkflowType {
    match variant {
        GraphVariant::Research => WorkflowType::Research,
        GraphVariant::Analysis => WorkflowType::Analysis,
        GraphVariant::Executor => WorkflowType::Executor,
        GraphVariant::Multiagent => WorkflowType::Multiagent,
    }
}

/// Sets the shared cancellation flag when the SSE body is dropped, which
/// happens as soon as axum notices the client socket went away (spec.md
/// §4.6: "backpressure: the controller writes directly to the client
/// socket, no buffering; a disconnect detected on the next write triggers
/// graph cancellation"). Dropping the generator itself already stops
/// driving the executor forward; this flag additionally lets the executor
/// record `Cancelled` if it gets one more poll in before teardown.
///
/// Also deregisters the run's signal from the shared
/// [`CancellationRegistry`] on drop, so `POST /objectives/{id}/cancel`
/// stops finding a signal for a run that already ended.
struct CancelOnDrop {
    signal: CancellationSignal,
    registry: Arc<CancellationRegistry>,
    objective_id: String,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.signal.store(true, Ordering::Relaxed);
        self.registry.unregister(&self.objective_id);
    }
}

/// `POST /api/v1/multiagent/stream` (spec.md §6). Starts a fresh objective
/// run, or resumes one past an interrupt when `thread_id` (and optionally
/// `interrupt_feedback`) is supplied, and streams the run as Server-Sent
/// Events per §4.6. `auto_execute` is accepted for schema compatibility;
/// this engine always drives a run to completion or interrupt, so it has
/// no further effect (manual single-step advancement is reachable instead
/// through the `/api/v1/scheduler/steps/schedule` endpoint).
pub async fn stream_multiagent(
    AxumState(core): AxumState<Core>,
    Json(req): Json<StreamRequest>,
) -> impl IntoResponse {
    let query = req.query();
    let variant = select_variant(&query);
    let thread_id = req.thread_id.clone().unwrap_or_else(new_id);
    let max_steps = req.max_steps.unwrap_or(core.max_steps);

    let sse_stream = async_stream::stream! {
        let deps = core.node_deps();
        let mut graph = match build_graph(variant, &deps) {
            Ok(g) => g,
            Err(e) => {
                yield Ok::<Event, std::convert::Infallible>(
                    ApiEvent::Error { error_type: "internal".to_string(), message: e.to_string(), thread_id: thread_id.clone() }.to_sse(),
                );
                return;
            }
        };
        graph = graph.with_checkpointer(core.checkpointer.clone()).with_max_steps(max_steps);

        let mut state = if let Some(existing_id) = &req.thread_id {
            match core.checkpointer.latest(existing_id).await.ok().flatten() {
                Some(checkpoint) => match WorkflowState::from_serialized(checkpoint.state) {
                    Ok(s) => s,
                    Err(e) => {
                        yield Ok(ApiEvent::Error { error_type: "internal".to_string(), message: e.to_string(), thread_id: thread_id.clone() }.to_sse());
                        return;
                    }
                },
                None => {
                    yield Ok(ApiEvent::Error {
                        error_type: "not_found".to_string(),
                        message: format!("no checkpoint for objective '{existing_id}'"),
                        thread_id: thread_id.clone(),
                    }.to_sse());
                    return;
                }
            }
        } else {
            let objective = Objective::new(query.clone());
            if let Err(e) = core.store.upsert_objective(&objective).await {
                yield Ok(ApiEvent::Error { error_type: "internal".to_string(), message: e.to_string(), thread_id: thread_id.clone() }.to_sse());
                return;
            }
            let workflow = Workflow::new(objective.objective_id.clone(), workflow_type_for(variant));
            if let Err(e) = core.store.create_workflow(&workflow).await {
                yield Ok(ApiEvent::Error { error_type: "internal".to_string(), message: e.to_string(), thread_id: thread_id.clone() }.to_sse());
                return;
            }
            yield Ok(ApiEvent::ObjectiveCreated { objective_id: objective.objective_id.clone() }.to_sse());
            WorkflowState::new(objective)
        };

        if let Some(locale) = &req.locale {
            state.add_message("system", format!("locale: {locale}"));
        }
        if let Some(context) = &req.additional_context {
            state.add_message("system", context.to_string());
        }
        if let Some(feedback) = &req.interrupt_feedback {
            state.add_message("user", feedback.to_string());
        }

        let objective_id = state.objective.objective_id.clone();
        let config = ExecutionConfig::new(thread_id.clone()).with_max_steps(max_steps);
        let executor = PregelExecutor::new(&graph, config);
        let cancel: CancellationSignal = Arc::new(AtomicBool::new(false));
        core.cancellations.register(objective_id.clone(), cancel.clone());
        let _guard = CancelOnDrop { signal: cancel.clone(), registry: core.cancellations.clone(), objective_id };

        let mut progress = ProgressTracker::new();
        let mut entities = EntityTracker::new();
        let inner = executor.run_stream(state, Some(cancel));
        futures::pin_mut!(inner);

        while let Some(item) = inner.next().await {
            match item {
                Ok(event) => {
                    for api_event in translate(event, &mut progress, &mut entities, &thread_id) {
                        yield Ok(api_event.to_sse());
                    }
                }
                Err(e) => {
                    yield Ok(ApiEvent::Error { error_type: "internal".to_string(), message: e.to_string(), thread_id: thread_id.clone() }.to_sse());
                    break;
                }
            }
        }
    };

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}
