use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::enums::ObjectiveStatus;
use crate::ids::{ObjectiveId, TaskId, new_id};
use crate::task::Task;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    pub objective_id: ObjectiveId,
    pub title: String,
    pub description: String,
    pub query: String,
    pub status: ObjectiveStatus,
    pub priority: u8,
    pub user_id: Option<String>,
    pub tags: HashSet<String>,
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result_summary: Option<String>,
    pub error_message: Option<String>,
    pub tasks: Vec<Task>,
}

impl Objective {
    pub fn new(query: impl Into<String>) -> Self {
        let query = query.into();
        Self {
            objective_id: new_id(),
            title: query.clone(),
            description: String::new(),
            query,
            status: ObjectiveStatus::Created,
            priority: 0,
            user_id: None,
            tags: HashSet::new(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result_summary: None,
            error_message: None,
            tasks: Vec::new(),
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn transition(&mut self, status: ObjectiveStatus) {
        self.status = status;
        if status.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        if status == ObjectiveStatus::Analyzing && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    pub fn add_task(&mut self, task: Task) {
        if !self.tasks.iter().any(|t| t.task_id == task.task_id) {
            self.tasks.push(task);
        }
    }

    pub fn task_by_id(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    pub fn task_by_id_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.task_id == task_id)
    }

    pub fn completed_task_ids(&self) -> HashSet<TaskId> {
        self.tasks
            .iter()
            .filter(|t| t.status == crate::enums::TaskStatus::Completed)
            .map(|t| t.task_id.clone())
            .collect()
    }

    /// Design Note §9: dependents are never stored; computed on demand.
    pub fn dependents_of(&self, task_id: &str) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.depends_on.iter().any(|d| d == task_id))
            .collect()
    }

    /// spec.md §3: when a task transitions to COMPLETED, every dependent
    /// whose remaining depends_on is empty moves PENDING -> READY in the
    /// same atomic update. Call after marking `completed_task_id` COMPLETED.
    pub fn promote_ready_dependents(&mut self, completed_task_id: &str) -> Vec<TaskId> {
        let completed = self.completed_task_ids();
        let mut promoted = Vec::new();
        for task in &mut self.tasks {
            if task.status != crate::enums::TaskStatus::Pending {
                continue;
            }
            if !task.depends_on.iter().any(|d| d == completed_task_id) {
                continue;
            }
            if task.is_ready(&completed) {
                task.mark_ready();
                promoted.push(task.task_id.clone());
            }
        }
        promoted
    }

    /// spec.md §4.3: picks the READY task of highest priority whose
    /// depends_on is fully COMPLETED, breaking ties by creation order.
    pub fn highest_priority_ready_task(&self) -> Option<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.status == crate::enums::TaskStatus::Ready)
            .max_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then(b.created_at.cmp(&a.created_at))
            })
    }

    pub fn all_tasks_terminal(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.status.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::TaskType;

    #[test]
    fn completed_at_set_iff_terminal() {
        let mut o = Objective::new("q");
        o.transition(ObjectiveStatus::Analyzing);
        assert!(o.completed_at.is_none());
        o.transition(ObjectiveStatus::Completed);
        assert!(o.completed_at.is_some());
    }

    #[test]
    fn dependent_promotion_requires_all_deps_complete() {
        let mut o = Objective::new("q");
        let a = Task::new(o.objective_id.clone(), "a", TaskType::Research);
        let mut b = Task::new(o.objective_id.clone(), "b", TaskType::Research);
        b.depends_on.insert(a.task_id.clone());
        let a_id = a.task_id.clone();
        o.add_task(a);
        o.add_task(b);

        o.task_by_id_mut(&a_id).unwrap().complete(None);
        let promoted = o.promote_ready_dependents(&a_id);
        assert_eq!(promoted.len(), 1);
        assert_eq!(
            o.tasks.iter().find(|t| t.task_id != a_id).unwrap().status,
            crate::enums::TaskStatus::Ready
        );
    }

    #[test]
    fn tie_break_by_creation_order() {
        let mut o = Objective::new("q");
        let mut first = Task::new(o.objective_id.clone(), "first", TaskType::Research);
        first.priority = 5;
        first.mark_ready();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let mut second = Task::new(o.objective_id.clone(), "second", TaskType::Research);
        second.priority = 5;
        second.mark_ready();
        o.add_task(second);
        o.add_task(first);
        let picked = o.highest_priority_ready_task().unwrap();
        assert_eq!(picked.title, "first");
    }
}
