use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveStatus {
    Created,
    Analyzing,
    Decomposing,
    Planning,
    Executing,
    Synthesizing,
    Completed,
    Failed,
    Cancelled,
    Paused,
}

impl ObjectiveStatus {
    /// spec.md §3: completed_at is set iff status is one of these three.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ObjectiveStatus::Completed | ObjectiveStatus::Failed | ObjectiveStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Ready,
    Scheduled,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
    Blocked,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Ready,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
    Skipped,
}

impl StepStatus {
    /// spec.md §4.2: task completes once every step is COMPLETED or SKIPPED.
    pub fn is_done(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Skipped)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Cancelled | StepStatus::Skipped
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Research,
    Analysis,
    Development,
    Integration,
    Testing,
    Documentation,
    Evaluation,
    Other,
}

impl TaskType {
    /// spec.md §4.2: research/processing router dispatch by task_type.
    pub fn routes_to_research(self) -> bool {
        matches!(self, TaskType::Research | TaskType::Testing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Excellent,
    Good,
    Acceptable,
    NeedsImprovement,
    Poor,
}

/// The three-way router label out of `quality_evaluator` (spec.md §4.2,
/// resolved Open Question #2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityRoute {
    Pass,
    Improve,
    Fail,
}

impl QualityLevel {
    pub fn route(self) -> QualityRoute {
        match self {
            QualityLevel::Excellent | QualityLevel::Good | QualityLevel::Acceptable => {
                QualityRoute::Pass
            }
            QualityLevel::NeedsImprovement => QualityRoute::Improve,
            QualityLevel::Poor => QualityRoute::Fail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_route_three_way() {
        assert_eq!(QualityLevel::Good.route(), QualityRoute::Pass);
        assert_eq!(QualityLevel::NeedsImprovement.route(), QualityRoute::Improve);
        assert_eq!(QualityLevel::Poor.route(), QualityRoute::Fail);
    }

    #[test]
    fn task_type_research_routing() {
        assert!(TaskType::Research.routes_to_research());
        assert!(TaskType::Testing.routes_to_research());
        assert!(!TaskType::Analysis.routes_to_research());
    }

    #[test]
    fn status_serialization_is_snake_case() {
        let s = serde_json::to_string(&ObjectiveStatus::Synthesizing).unwrap();
        assert_eq!(s, "\"synthesizing\"");
    }
}
