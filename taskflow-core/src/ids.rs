use uuid::Uuid;

pub type ObjectiveId = String;
pub type TaskId = String;
pub type StepId = String;
pub type WorkflowId = String;
pub type CheckpointId = String;

/// Generates an opaque id. A v4 UUID's hyphenated form is exactly 36
/// characters, matching the store's "UTF-8 strings up to 36 chars"
/// constraint (spec.md §6).
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
