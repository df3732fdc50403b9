//! Workflow state machine

use serde::{Deserialize, Serialize};
use std::fmt;

use super::WorkflowError;

/// States of one workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Start,
    Preprocess,
    Retrieve,
    Filter,
    Synthesize,
    Grade,
    Accept,
    Retry,
    Exhausted,
    Compose,
    Done,
    Failed,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Preprocess => "preprocess",
            Self::Retrieve => "retrieve",
            Self::Filter => "filter",
            Self::Synthesize => "synthesize",
            Self::Grade => "grade",
            Self::Accept => "accept",
            Self::Retry => "retry",
            Self::Exhausted => "exhausted",
            Self::Compose => "compose",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `next` may directly follow this state.
    ///
    /// Besides the forward path, a stage failure may jump to `Compose`
    /// (fatal) and a synthesis failure may consume a retry slot.
    pub fn can_transition_to(&self, next: WorkflowState) -> bool {
        use WorkflowState::*;

        matches!(
            (self, next),
            (Start, Preprocess)
                | (Preprocess, Retrieve)
                | (Preprocess, Compose)
                | (Retrieve, Filter)
                | (Retrieve, Compose)
                | (Filter, Synthesize)
                | (Synthesize, Grade)
                | (Synthesize, Retry)
                | (Synthesize, Exhausted)
                | (Synthesize, Compose)
                | (Grade, Accept)
                | (Grade, Retry)
                | (Grade, Exhausted)
                | (Grade, Compose)
                | (Accept, Compose)
                | (Exhausted, Compose)
                | (Retry, Preprocess)
                | (Compose, Done)
                | (Compose, Failed)
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state plus the full transition log of a run
#[derive(Debug, Clone, PartialEq)]
pub struct StateMachine {
    current: WorkflowState,
    trace: Vec<WorkflowState>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: WorkflowState::Start,
            trace: vec![WorkflowState::Start],
        }
    }

    pub fn current(&self) -> WorkflowState {
        self.current
    }

    pub fn trace(&self) -> &[WorkflowState] {
        &self.trace
    }

    pub fn into_trace(self) -> Vec<WorkflowState> {
        self.trace
    }

    /// Move to `next`, rejecting transitions the machine does not define
    pub fn advance(&mut self, next: WorkflowState) -> Result<(), WorkflowError> {
        if !self.current.can_transition_to(next) {
            return Err(WorkflowError::internal(format!(
                "invalid workflow transition {} -> {}",
                self.current, next
            )));
        }

        tracing::trace!(from = %self.current, to = %next, "Workflow transition");
        self.current = next;
        self.trace.push(next);
        Ok(())
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use WorkflowState::*;

    #[test]
    fn test_happy_path() {
        let mut machine = StateMachine::new();
        for state in [Preprocess, Retrieve, Filter, Synthesize, Grade, Accept, Compose, Done] {
            machine.advance(state).unwrap();
        }

        assert_eq!(machine.current(), Done);
        assert!(machine.current().is_terminal());
        assert_eq!(machine.trace().len(), 9);
        assert_eq!(machine.trace()[0], Start);
    }

    #[test]
    fn test_retry_loops_back_to_preprocess() {
        let mut machine = StateMachine::new();
        for state in [
            Preprocess, Retrieve, Filter, Synthesize, Grade, Retry, Preprocess, Retrieve, Filter,
            Synthesize, Grade, Exhausted, Compose, Done,
        ] {
            machine.advance(state).unwrap();
        }

        assert_eq!(
            machine.trace().iter().filter(|s| **s == Preprocess).count(),
            2
        );
    }

    #[test]
    fn test_fatal_path_goes_through_compose() {
        let mut machine = StateMachine::new();
        machine.advance(Preprocess).unwrap();
        machine.advance(Retrieve).unwrap();
        machine.advance(Compose).unwrap();
        machine.advance(Failed).unwrap();

        assert!(machine.current().is_terminal());
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut machine = StateMachine::new();

        let err = machine.advance(Grade).unwrap_err();
        assert_eq!(err.kind(), "internal_error");
        assert_eq!(machine.current(), Start);

        assert!(!Done.can_transition_to(Preprocess));
        assert!(!Accept.can_transition_to(Retry));
        assert!(!Filter.can_transition_to(Compose));
    }
}
