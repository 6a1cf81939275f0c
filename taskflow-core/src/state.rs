use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{StepId, TaskId, new_id};
use crate::objective::Objective;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub content: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub metadata: HashMap<String, Value>,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: role.into(),
            created_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Llm,
    Database,
    Worker,
    ExternalApi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceAllocationStatus {
    Allocated,
    Released,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub resource_id: String,
    pub resource_kind: ResourceKind,
    pub status: ResourceAllocationStatus,
    pub allocated_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, Value>,
}

impl ResourceAllocation {
    pub fn new(resource_id: impl Into<String>, resource_kind: ResourceKind) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_kind,
            status: ResourceAllocationStatus::Allocated,
            allocated_at: Utc::now(),
            released_at: None,
            metadata: HashMap::new(),
        }
    }

    pub fn release(&mut self) {
        self.status = ResourceAllocationStatus::Released;
        self.released_at = Some(Utc::now());
    }
}

/// One entry of `state.error` (spec.md §4.2 point 6 / §7 / §9's
/// `Result{state, error}` mapping). Carries enough for `error_handler`'s
/// decision policy and for the `error` SSE event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub error_type: String,
    pub message: String,
    pub details: Value,
    pub node: String,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorInfo {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            details: Value::Null,
            node: node.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// `context_analysis` shape written by `context_analyzer` (spec.md §4.2).
/// Modeled as one canonical shape per Open Question resolution #4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextAnalysis {
    pub domain: String,
    pub secondary_domains: Vec<String>,
    pub key_concepts: Vec<String>,
    pub goal_type: String,
    pub region: Option<String>,
    pub time_constraints: Option<String>,
    pub language: String,
    pub complexity: u8,
    pub information_needs: Vec<String>,
}

/// `{score, quality_level, feedback, improvement_suggestions}` written by
/// `quality_evaluator` (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAssessmentResult {
    pub score: f32,
    pub quality_level: crate::enums::QualityLevel,
    pub feedback: String,
    pub improvement_suggestions: Vec<String>,
}

/// Result of `synthesis`: the full report plus any structured extras.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub report: String,
    pub sources: Vec<String>,
    pub metadata: HashMap<String, Value>,
}

/// The typed cross-node blackboard (Design Note §9: replaces a
/// `dict[str, Any]` with declared keys and typed accessors). Unknown keys
/// have no setter in non-test code — this is not a generic key/value store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntermediateData {
    pub context_analysis: Option<ContextAnalysis>,
    pub synthesis_result: Option<SynthesisResult>,
    pub quality_assessments: HashMap<String, QualityAssessmentResult>,
    /// symbolic title -> depends_on titles, produced by objective_decomposer
    /// before symbolic dependencies are resolved into task_ids.
    pub task_dependencies_by_title: HashMap<String, Vec<String>>,
    pub error_history: Vec<ErrorInfo>,
    pub retry_counters: HashMap<String, u32>,
}

impl IntermediateData {
    pub fn context_analysis(&self) -> Option<&ContextAnalysis> {
        self.context_analysis.as_ref()
    }

    pub fn set_context_analysis(&mut self, value: ContextAnalysis) {
        self.context_analysis = Some(value);
    }

    pub fn synthesis_result(&self) -> Option<&SynthesisResult> {
        self.synthesis_result.as_ref()
    }

    pub fn set_synthesis_result(&mut self, value: SynthesisResult) {
        self.synthesis_result = Some(value);
    }

    pub fn task_dependencies_by_title(&self) -> &HashMap<String, Vec<String>> {
        &self.task_dependencies_by_title
    }

    pub fn set_task_dependencies_by_title(&mut self, map: HashMap<String, Vec<String>>) {
        self.task_dependencies_by_title = map;
    }

    pub fn error_history(&self) -> &[ErrorInfo] {
        &self.error_history
    }

    pub fn push_error_history(&mut self, error: ErrorInfo) {
        self.error_history.push(error);
    }

    pub fn retry_counter(&self, node: &str) -> u32 {
        self.retry_counters.get(node).copied().unwrap_or(0)
    }

    pub fn increment_retry_counter(&mut self, node: &str) -> u32 {
        let counter = self.retry_counters.entry(node.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }
}

/// Bookkeeping about the graph run itself, folded into `Workflow` at
/// persistence time rather than kept as a separate nested entity
/// (SPEC_FULL.md §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub workflow_id: String,
    pub workflow_type: String,
    pub checkpoint_ids: Vec<String>,
    pub is_paused: bool,
    pub latest_node: Option<String>,
    pub tags: Vec<String>,
}

/// The in-memory value flowing through the graph engine (spec.md §3's
/// "Runtime state"). The engine is the sole writer; nodes receive it by
/// exclusive reference and hand back a mutated value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub workflow_metadata: WorkflowMetadata,
    pub objective: Objective,
    pub current_task: Option<TaskId>,
    pub current_step: Option<StepId>,
    pub messages: Vec<Message>,
    pub intermediate_data: IntermediateData,
    pub error: Option<ErrorInfo>,
    pub visited_nodes: Vec<String>,
    pub allocated_resources: Vec<ResourceAllocation>,
}

impl State {
    pub fn new(objective: Objective) -> Self {
        Self {
            workflow_metadata: WorkflowMetadata::default(),
            objective,
            current_task: None,
            current_step: None,
            messages: Vec::new(),
            intermediate_data: IntermediateData::default(),
            error: None,
            visited_nodes: Vec::new(),
            allocated_resources: Vec::new(),
        }
    }

    pub fn add_message(&mut self, role: impl Into<String>, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
    }

    pub fn set_error(&mut self, error_type: impl Into<String>, message: impl Into<String>, node: impl Into<String>) {
        let info = ErrorInfo::new(error_type, message, node);
        self.intermediate_data.push_error_history(info.clone());
        self.error = Some(info);
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn mark_node_visited(&mut self, node: impl Into<String>) {
        self.visited_nodes.push(node.into());
    }

    pub fn current_task(&self) -> Option<&crate::task::Task> {
        self.current_task
            .as_deref()
            .and_then(|id| self.objective.task_by_id(id))
    }

    pub fn current_task_mut(&mut self) -> Option<&mut crate::task::Task> {
        let id = self.current_task.clone()?;
        self.objective.task_by_id_mut(&id)
    }

    pub fn current_step(&self) -> Option<&crate::step::Step> {
        let task = self.current_task()?;
        self.current_step.as_deref().and_then(|id| task.step_by_id(id))
    }

    pub fn allocate_resource(&mut self, resource_id: impl Into<String>, kind: ResourceKind) -> String {
        let alloc = ResourceAllocation::new(resource_id, kind);
        let id = alloc.resource_id.clone();
        self.allocated_resources.push(alloc);
        id
    }

    pub fn release_resource(&mut self, resource_id: &str) {
        if let Some(alloc) = self
            .allocated_resources
            .iter_mut()
            .find(|r| r.resource_id == resource_id)
        {
            alloc.release();
        }
    }

    /// Generates a fresh step id for nodes constructing new steps.
    pub fn new_step_id() -> String {
        new_id()
    }

    /// Builds a `serialized_state` JSON snapshot for `Workflow`/checkpoint
    /// persistence (spec.md §3/§4.4). Round-tripping through
    /// `serde_json::from_value` reproduces an identical `State` modulo
    /// timestamp rounding (spec.md §8).
    pub fn to_serialized(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn from_serialized(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::Objective;

    #[test]
    fn error_roundtrip_clears_and_records_history() {
        let mut state = State::new(Objective::new("q"));
        state.set_error("Temporary", "boom", "research");
        assert!(state.error.is_some());
        assert_eq!(state.intermediate_data.error_history().len(), 1);
        state.clear_error();
        assert!(state.error.is_none());
        assert_eq!(state.intermediate_data.error_history().len(), 1);
    }

    #[test]
    fn serialized_state_roundtrips() {
        let mut state = State::new(Objective::new("q"));
        state.add_message("user", "hello");
        let json = state.to_serialized();
        let restored = State::from_serialized(json).unwrap();
        assert_eq!(restored.messages.len(), 1);
        assert_eq!(restored.objective.query, "q");
    }

    #[test]
    fn resource_allocation_lifecycle() {
        let mut state = State::new(Objective::new("q"));
        let id = state.allocate_resource("llm-1", ResourceKind::Llm);
        state.release_resource(&id);
        assert_eq!(
            state.allocated_resources[0].status,
            ResourceAllocationStatus::Released
        );
    }
}
