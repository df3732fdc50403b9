//! Workflow orchestration

mod workflow;

pub use workflow::{QueryWorkflowOrchestrator, WorkflowStages};
