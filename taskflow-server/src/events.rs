use std::collections::HashSet;

use axum::response::sse::Event;
use serde_json::{json, Value};
use taskflow_core::State;
use taskflow_graph::StreamEvent;

use crate::progress::ProgressTracker;

/// The outward-facing SSE event taxonomy (spec.md §4.6). Three taxonomy
/// members — `tool_calls`, `tool_call_chunks`, `tool_call_result` — are
/// never constructed: nothing in this system calls a tool distinct from an
/// agent's own JSON response, so there is no code path that produces them.
#[derive(Debug, Clone)]
pub enum ApiEvent {
    AgentStart { node: String },
    AgentOutput { node: String, output: Value },
    MessageChunk { node: String, chunk: String, is_final: bool },
    Interrupt { node: String, message: String, options: Vec<String> },
    ObjectiveCreated { objective_id: String },
    TaskCreated { task_id: String, title: String },
    StepCreated { step_id: String, task_id: String },
    StepCompleted { step_id: String, task_id: String },
    ProgressUpdate { percent: u8 },
    StateUpdate { state: Value },
    Error { error_type: String, message: String, thread_id: String },
    FinalResult { objective_id: String, result_summary: Option<String> },
    Cancelled { node: String },
}

impl ApiEvent {
    fn name(&self) -> &'static str {
        match self {
            ApiEvent::AgentStart { .. } => "agent_start",
            ApiEvent::AgentOutput { .. } => "agent_output",
            ApiEvent::MessageChunk { .. } => "message_chunk",
            ApiEvent::Interrupt { .. } => "interrupt",
            ApiEvent::ObjectiveCreated { .. } => "objective_created",
            ApiEvent::TaskCreated { .. } => "task_created",
            ApiEvent::StepCreated { .. } => "step_created",
            ApiEvent::StepCompleted { .. } => "step_completed",
            ApiEvent::ProgressUpdate { .. } => "progress_update",
            ApiEvent::StateUpdate { .. } => "state_update",
            ApiEvent::Error { .. } => "error",
            ApiEvent::FinalResult { .. } => "final_result",
            ApiEvent::Cancelled { .. } => "cancelled",
        }
    }

    fn payload(&self) -> Value {
        match self {
            ApiEvent::AgentStart { node } => json!({ "node": node }),
            ApiEvent::AgentOutput { node, output } => json!({ "node": node, "output": output }),
            ApiEvent::MessageChunk { node, chunk, is_final } => {
                let mut obj = json!({ "node": node, "is_final": is_final });
                if !chunk.is_empty() {
                    obj["content"] = json!(chunk);
                }
                obj
            }
            ApiEvent::Interrupt { node, message, options } => {
                json!({ "node": node, "message": message, "options": options })
            }
            ApiEvent::ObjectiveCreated { objective_id } => json!({ "objective_id": objective_id }),
            ApiEvent::TaskCreated { task_id, title } => json!({ "task_id": task_id, "title": title }),
            ApiEvent::StepCreated { step_id, task_id } => json!({ "step_id": step_id, "task_id": task_id }),
            ApiEvent::StepCompleted { step_id, task_id } => json!({ "step_id": step_id, "task_id": task_id }),
            ApiEvent::ProgressUpdate { percent } => json!({ "percent": percent }),
            ApiEvent::StateUpdate { state } => state.clone(),
            ApiEvent::Error { error_type, message, thread_id } => {
                json!({ "type": error_type, "message": message, "thread_id": thread_id })
            }
            ApiEvent::FinalResult { objective_id, result_summary } => {
                let mut obj = json!({ "objective_id": objective_id });
                if let Some(summary) = result_summary {
                    obj["result_summary"] = json!(summary);
                }
                obj
            }
            ApiEvent::Cancelled { node } => json!({ "node": node }),
        }
    }

    /// spec.md §4.6 framing: `event: <type>\ndata: <utf8 json>\n\n`, the data
    /// always a single line (serde_json never emits bare newlines, only
    /// escaped ones inside strings).
    pub fn to_sse(&self) -> Event {
        Event::default().event(self.name()).data(self.payload().to_string())
    }
}

/// Diffs successive `State` snapshots to synthesize the domain-creation
/// events (`task_created`, `step_created`, `step_completed`) that the graph
/// engine itself has no reason to emit — it only knows about node
/// transitions, not entity lifecycles.
#[derive(Default)]
pub struct EntityTracker {
    known_tasks: HashSet<String>,
    known_steps: HashSet<String>,
    completed_steps: HashSet<String>,
}

impl EntityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diff(&mut self, state: &State) -> Vec<ApiEvent> {
        let mut events = Vec::new();
        for task in &state.objective.tasks {
            if self.known_tasks.insert(task.task_id.clone()) {
                events.push(ApiEvent::TaskCreated { task_id: task.task_id.clone(), title: task.title.clone() });
            }
            for step in &task.steps {
                if self.known_steps.insert(step.step_id.clone()) {
                    events.push(ApiEvent::StepCreated { step_id: step.step_id.clone(), task_id: task.task_id.clone() });
                }
                if step.status == taskflow_core::StepStatus::Completed && self.completed_steps.insert(step.step_id.clone()) {
                    events.push(ApiEvent::StepCompleted { step_id: step.step_id.clone(), task_id: task.task_id.clone() });
                }
            }
        }
        events
    }
}

/// Translates one engine-level `StreamEvent` into zero or more client-facing
/// `ApiEvent`s, grounded in `adk-server/src/rest/controllers/runtime.rs`'s
/// `serialize_runtime_event`, here specialized to this domain's own event
/// shapes rather than ADK's generic content-part model.
pub fn translate(
    event: StreamEvent,
    progress: &mut ProgressTracker,
    entities: &mut EntityTracker,
    thread_id: &str,
) -> Vec<ApiEvent> {
    match event {
        StreamEvent::Update { node, state, .. } => {
            let parsed = State::from_serialized(state.clone()).ok();
            let mut out = vec![ApiEvent::AgentStart { node: node.clone() }, ApiEvent::AgentOutput { node: node.clone(), output: state.clone() }];
            if let Some(parsed_state) = &parsed {
                out.extend(entities.diff(parsed_state));
            }
            out.push(ApiEvent::ProgressUpdate { percent: progress.record(&node) });
            out.push(ApiEvent::StateUpdate { state });
            out
        }
        StreamEvent::Message { node, chunk, is_final } => {
            vec![ApiEvent::MessageChunk { node, chunk, is_final }]
        }
        StreamEvent::Waiting { .. } => Vec::new(),
        StreamEvent::Interrupted { node, message, options } => {
            vec![ApiEvent::Interrupt { node, message, options }]
        }
        StreamEvent::Cancelled { node } => vec![ApiEvent::Cancelled { node }],
        StreamEvent::Done { state, .. } => {
            let result_summary = State::from_serialized(state.clone())
                .ok()
                .and_then(|s| s.objective.result_summary.clone());
            let objective_id = State::from_serialized(state.clone())
                .ok()
                .map(|s| s.objective.objective_id)
                .unwrap_or_default();
            vec![
                ApiEvent::StateUpdate { state },
                ApiEvent::FinalResult { objective_id, result_summary },
            ]
        }
        StreamEvent::Error { message, .. } => {
            vec![ApiEvent::Error { error_type: "internal".to_string(), message, thread_id: thread_id.to_string() }]
        }
    }
}
