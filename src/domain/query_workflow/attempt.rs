//! Per-attempt records and best-attempt tracking

use serde::{Deserialize, Serialize};

use super::{GradedAnswer, Query};
use crate::domain::retrieval::FusedResult;

/// How an attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Accepted,
    Retrying,
    Exhausted,
    /// A stage failed fatally (retrieval, or synthesis with no retry left)
    Failed,
}

/// Record of one pass through the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowAttempt {
    /// 0-based, never above `max_retries`
    pub index: u32,
    pub query: Query,
    pub evidence: FusedResult,
    /// Absent when synthesis failed
    pub graded: Option<GradedAnswer>,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowAttempt {
    pub fn score(&self) -> Option<f32> {
        self.graded.as_ref().map(|g| g.score)
    }

    pub fn passed(&self) -> bool {
        self.graded.as_ref().is_some_and(|g| g.passed)
    }
}

/// Accumulator remembering the highest-scoring graded answer of a run.
///
/// Ties keep the earlier attempt.
#[derive(Debug, Clone, Default)]
pub struct BestAttempt {
    best: Option<(u32, GradedAnswer)>,
}

impl BestAttempt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offer(&mut self, index: u32, graded: &GradedAnswer) {
        let better = match &self.best {
            Some((_, current)) => graded.score > current.score,
            None => true,
        };
        if better {
            self.best = Some((index, graded.clone()));
        }
    }

    pub fn index(&self) -> Option<u32> {
        self.best.as_ref().map(|(idx, _)| *idx)
    }

    pub fn into_inner(self) -> Option<(u32, GradedAnswer)> {
        self.best
    }
}
