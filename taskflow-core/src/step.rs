use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::enums::{QualityLevel, StepStatus};
use crate::ids::{StepId, TaskId, new_id};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub step_id: StepId,
    pub task_id: TaskId,
    pub title: String,
    pub description: String,
    pub step_type: String,
    pub status: StepStatus,
    pub agent_name: String,
    pub priority: u8,
    pub input_data: Value,
    pub output_data: Option<Value>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub quality_assessment: Option<QualityLevel>,
    pub metadata: HashMap<String, Value>,
}

impl Step {
    pub fn new(task_id: impl Into<String>, title: impl Into<String>, agent_name: impl Into<String>) -> Self {
        Self {
            step_id: new_id(),
            task_id: task_id.into(),
            title: title.into(),
            description: String::new(),
            step_type: String::new(),
            status: StepStatus::Pending,
            agent_name: agent_name.into(),
            priority: 0,
            input_data: Value::Null,
            output_data: None,
            error_message: None,
            retry_count: 0,
            max_retries: 3,
            started_at: None,
            completed_at: None,
            quality_assessment: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_step_type(mut self, step_type: impl Into<String>) -> Self {
        self.step_type = step_type.into();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_input_data(mut self, input_data: Value) -> Self {
        self.input_data = input_data;
        self
    }

    /// spec.md §3: retry_count <= max_retries at all times.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    pub fn mark_ready(&mut self) {
        self.status = StepStatus::Ready;
    }

    pub fn mark_running(&mut self) {
        self.status = StepStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self, output_data: Value) {
        self.output_data = Some(output_data);
        self.status = StepStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error_message: impl Into<String>) {
        self.error_message = Some(error_message.into());
        self.status = StepStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    pub fn retry(&mut self) {
        self.retry_count += 1;
        self.error_message = None;
        self.status = StepStatus::Ready;
    }

    pub fn skip(&mut self) {
        self.status = StepStatus::Skipped;
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_budget_is_respected() {
        let mut step = Step::new("t1", "do thing", "research");
        assert!(step.can_retry());
        step.retry_count = step.max_retries;
        assert!(!step.can_retry());
    }

    #[test]
    fn completing_sets_terminal_fields() {
        let mut step = Step::new("t1", "do thing", "research");
        step.complete(Value::String("done".into()));
        assert_eq!(step.status, StepStatus::Completed);
        assert!(step.completed_at.is_some());
        assert!(step.output_data.is_some());
    }
}
