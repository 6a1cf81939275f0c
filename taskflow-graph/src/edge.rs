use std::collections::HashMap;
use std::sync::Arc;

use taskflow_core::State;

pub const START: &str = "__start__";
pub const END: &str = "__end__";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeTarget {
    Node(String),
    End,
}

impl EdgeTarget {
    pub fn is_end(&self) -> bool {
        matches!(self, EdgeTarget::End)
    }

    pub fn node_name(&self) -> Option<&str> {
        match self {
            EdgeTarget::Node(name) => Some(name),
            EdgeTarget::End => None,
        }
    }
}

impl From<&str> for EdgeTarget {
    fn from(value: &str) -> Self {
        if value == END {
            EdgeTarget::End
        } else {
            EdgeTarget::Node(value.to_string())
        }
    }
}

/// A pure function at the outgoing edge of a node that selects the next
/// node from a labelled set (GLOSSARY: Router).
pub type RouterFn = Arc<dyn Fn(&State) -> String + Send + Sync>;

#[derive(Clone)]
pub enum Edge {
    Direct {
        source: String,
        target: EdgeTarget,
    },
    Conditional {
        source: String,
        router: RouterFn,
        targets: HashMap<String, EdgeTarget>,
        default: Option<EdgeTarget>,
    },
    Entry {
        targets: Vec<String>,
    },
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Direct { source, target } => {
                f.debug_struct("Direct").field("source", source).field("target", target).finish()
            }
            Edge::Conditional { source, targets, default, .. } => f
                .debug_struct("Conditional")
                .field("source", source)
                .field("targets", targets)
                .field("default", default)
                .finish(),
            Edge::Entry { targets } => f.debug_struct("Entry").field("targets", targets).finish(),
        }
    }
}

/// Ready-made router predicates for the node contracts in spec.md §4.2.
pub struct Router;

impl Router {
    /// research/processing dispatch by task_type (spec.md §4.2).
    pub fn by_task_type() -> impl Fn(&State) -> String + Send + Sync + Clone {
        |state: &State| {
            state
                .current_task()
                .map(|t| if t.task_type.routes_to_research() { "research" } else { "processing" })
                .unwrap_or("processing")
                .to_string()
        }
    }

    /// quality_evaluator's three-way pass/improve/fail router (spec.md §4.2,
    /// Open Question #2).
    pub fn by_quality() -> impl Fn(&State) -> String + Send + Sync + Clone {
        |state: &State| {
            let level = state
                .current_step()
                .and_then(|s| s.quality_assessment)
                .or_else(|| state.current_task().and_then(|t| t.quality_assessment));
            match level.map(|l| l.route()) {
                Some(taskflow_core::QualityRoute::Pass) | None => "pass".to_string(),
                Some(taskflow_core::QualityRoute::Improve) => "improve".to_string(),
                Some(taskflow_core::QualityRoute::Fail) => "fail".to_string(),
            }
        }
    }

    /// select_next_task's three-way done/wait/continue router (spec.md §4.2).
    pub fn by_selection(label: &'static str) -> impl Fn(&State) -> String + Send + Sync + Clone {
        move |_state: &State| label.to_string()
    }

    /// spec.md §4.1 routing rule #1: if state.error is set, route to
    /// error_handler regardless of any static or conditional edge. Applied
    /// by the engine itself before consulting the graph's edges, but
    /// exposed here too for tests and for nodes that want to pre-empt.
    pub fn on_error(state: &State) -> Option<&'static str> {
        state.error.as_ref().map(|_| "error_handler")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskflow_core::{Objective, Task, TaskType};

    #[test]
    fn edge_target_from_end_constant() {
        assert_eq!(EdgeTarget::from(END), EdgeTarget::End);
        assert_eq!(EdgeTarget::from("foo"), EdgeTarget::Node("foo".to_string()));
    }

    #[test]
    fn router_dispatches_by_task_type() {
        let mut objective = Objective::new("q");
        let mut task = Task::new(objective.objective_id.clone(), "t", TaskType::Analysis);
        task.mark_ready();
        let task_id = task.task_id.clone();
        objective.add_task(task);
        let mut state = State::new(objective);
        state.current_task = Some(task_id);
        let router = Router::by_task_type();
        assert_eq!(router(&state), "processing");
    }

    #[test]
    fn on_error_takes_precedence() {
        let mut state = State::new(Objective::new("q"));
        assert!(Router::on_error(&state).is_none());
        state.set_error("Temporary", "boom", "research");
        assert_eq!(Router::on_error(&state), Some("error_handler"));
    }
}
