//! Domain types for the taskflow multi-agent research orchestrator:
//! Objective/Task/Step/Workflow/WorkflowCheckpoint, their enums, and the
//! typed `State` blackboard that flows through the graph engine.

pub mod checkpoint;
pub mod enums;
pub mod error;
pub mod ids;
pub mod objective;
pub mod state;
pub mod step;
pub mod task;
pub mod workflow;

pub use checkpoint::WorkflowCheckpoint;
pub use enums::{ObjectiveStatus, QualityLevel, QualityRoute, StepStatus, TaskStatus, TaskType};
pub use error::{CoreError, Result};
pub use ids::{CheckpointId, ObjectiveId, StepId, TaskId, WorkflowId, new_id};
pub use objective::Objective;
pub use state::{
    ContextAnalysis, ErrorInfo, IntermediateData, Message, QualityAssessmentResult,
    ResourceAllocation, ResourceAllocationStatus, ResourceKind, State, SynthesisResult,
    WorkflowMetadata,
};
pub use step::Step;
pub use task::{Task, validate_acyclic};
pub use workflow::{Workflow, WorkflowStatus, WorkflowType};
