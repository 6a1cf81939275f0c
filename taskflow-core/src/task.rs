use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::enums::{QualityLevel, TaskStatus, TaskType};
use crate::ids::{ObjectiveId, TaskId, new_id};
use crate::step::Step;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub objective_id: ObjectiveId,
    pub title: String,
    pub description: String,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub priority: u8,
    /// Stored; `dependents` is intentionally absent as a field (Design Note
    /// §9) and is instead computed by `Objective::dependents_of`.
    pub depends_on: HashSet<TaskId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result_summary: Option<String>,
    pub error_message: Option<String>,
    pub quality_assessment: Option<QualityLevel>,
    pub metadata: HashMap<String, Value>,
    pub steps: Vec<Step>,
    /// Last time this task reported forward progress while RUNNING.
    /// spec.md §4.5's scheduler sweep fails RUNNING tasks whose heartbeat has
    /// gone stale (stuck step execution, crashed worker), independent of any
    /// step-level `max_retries` budget.
    pub heartbeat_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(objective_id: impl Into<String>, title: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            task_id: new_id(),
            objective_id: objective_id.into(),
            title: title.into(),
            description: String::new(),
            task_type,
            status: TaskStatus::Pending,
            priority: 0,
            depends_on: HashSet::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result_summary: None,
            error_message: None,
            quality_assessment: None,
            metadata: HashMap::new(),
            steps: Vec::new(),
            heartbeat_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_depends_on(mut self, depends_on: HashSet<TaskId>) -> Self {
        self.depends_on = depends_on;
        self
    }

    /// spec.md §3: a task is READY iff every dependency is COMPLETED.
    pub fn is_ready(&self, completed: &HashSet<TaskId>) -> bool {
        self.depends_on.iter().all(|d| completed.contains(d))
    }

    pub fn add_step(&mut self, step: Step) {
        if !self.steps.iter().any(|s| s.step_id == step.step_id) {
            self.steps.push(step);
        }
    }

    pub fn step_by_id(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    pub fn step_by_id_mut(&mut self, step_id: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.step_id == step_id)
    }

    /// spec.md §4.2: first pending step after the current one becomes READY.
    pub fn next_pending_step(&self) -> Option<&Step> {
        self.steps
            .iter()
            .find(|s| s.status == crate::enums::StepStatus::Pending)
    }

    /// spec.md §3: task completes once every step is terminal-done
    /// (COMPLETED or SKIPPED).
    pub fn all_steps_done(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.status.is_done())
    }

    pub fn mark_ready(&mut self) {
        self.status = TaskStatus::Ready;
    }

    pub fn mark_running(&mut self) {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
        self.heartbeat_at = Some(Utc::now());
    }

    /// Records forward progress on a RUNNING task, resetting the scheduler's
    /// stale-heartbeat clock. Called whenever one of the task's steps
    /// completes.
    pub fn touch_heartbeat(&mut self) {
        self.heartbeat_at = Some(Utc::now());
    }

    /// spec.md §4.5: a RUNNING task whose heartbeat is older than `ttl` is
    /// swept and failed. A task with no heartbeat at all (never touched
    /// since `mark_running`) counts as expired.
    pub fn is_heartbeat_expired(&self, ttl: chrono::Duration) -> bool {
        match self.heartbeat_at {
            Some(at) => Utc::now() - at > ttl,
            None => true,
        }
    }

    pub fn complete(&mut self, result_summary: Option<String>) {
        self.status = TaskStatus::Completed;
        self.result_summary = result_summary;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error_message: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error_message = Some(error_message.into());
        self.completed_at = Some(Utc::now());
    }
}

/// Returns `Err` naming the first task id found on a cycle, otherwise `Ok(())`.
///
/// spec.md §3/§8: depends_on forms a DAG within an objective; a task cannot
/// depend on itself.
pub fn validate_acyclic(tasks: &[Task]) -> Result<(), TaskId> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let index: HashMap<&str, &Task> = tasks.iter().map(|t| (t.task_id.as_str(), t)).collect();
    let mut marks: HashMap<&str, Mark> = tasks.iter().map(|t| (t.task_id.as_str(), Mark::Unvisited)).collect();

    fn visit<'a>(
        id: &'a str,
        index: &HashMap<&'a str, &'a Task>,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> Result<(), TaskId> {
        match marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => return Err(id.to_string()),
            _ => {}
        }
        marks.insert(id, Mark::InProgress);
        if let Some(task) = index.get(id) {
            for dep in &task.depends_on {
                if dep == id {
                    return Err(id.to_string());
                }
                visit(dep.as_str(), index, marks)?;
            }
        }
        marks.insert(id, Mark::Done);
        Ok(())
    }

    for task in tasks {
        visit(&task.task_id, &index, &mut marks)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_dependency_is_rejected() {
        let mut t = Task::new("o1", "t", TaskType::Research);
        t.depends_on.insert(t.task_id.clone());
        let err = validate_acyclic(std::slice::from_ref(&t));
        assert!(err.is_err());
    }

    #[test]
    fn cycle_is_rejected() {
        let mut a = Task::new("o1", "a", TaskType::Research);
        let mut b = Task::new("o1", "b", TaskType::Research);
        a.depends_on.insert(b.task_id.clone());
        b.depends_on.insert(a.task_id.clone());
        assert!(validate_acyclic(&[a, b]).is_err());
    }

    #[test]
    fn dag_is_accepted() {
        let a = Task::new("o1", "a", TaskType::Research);
        let mut b = Task::new("o1", "b", TaskType::Research);
        b.depends_on.insert(a.task_id.clone());
        assert!(validate_acyclic(&[a, b]).is_ok());
    }

    #[test]
    fn heartbeat_expires_after_ttl() {
        let mut t = Task::new("o1", "t", TaskType::Research);
        t.mark_running();
        assert!(!t.is_heartbeat_expired(chrono::Duration::seconds(60)));
        t.heartbeat_at = Some(Utc::now() - chrono::Duration::seconds(61));
        assert!(t.is_heartbeat_expired(chrono::Duration::seconds(60)));
    }

    #[test]
    fn task_never_heartbeaten_counts_as_expired() {
        let t = Task::new("o1", "t", TaskType::Research);
        assert!(t.is_heartbeat_expired(chrono::Duration::seconds(60)));
    }

    #[test]
    fn readiness_requires_all_deps_completed() {
        let mut t = Task::new("o1", "t", TaskType::Research);
        t.depends_on.insert("dep1".to_string());
        let completed = HashSet::new();
        assert!(!t.is_ready(&completed));
        let mut completed = HashSet::new();
        completed.insert("dep1".to_string());
        assert!(t.is_ready(&completed));
    }
}
