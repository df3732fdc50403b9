//! Stage traits driven by the orchestrator

use async_trait::async_trait;
use std::fmt::Debug;

use super::{ConversationContext, DraftAnswer, GradedAnswer, OutputFormat, Query, WorkflowError};
use crate::domain::retrieval::FusedResult;
use crate::domain::DomainError;

/// Turns the raw question into a [`Query`] for one attempt.
///
/// Infallible: every sub-step falls back to the unmodified question. Attempts
/// after the first must change strategy so a retry does not repeat the same
/// failing retrieval.
#[async_trait]
pub trait QueryPreprocessor: Send + Sync + Debug {
    async fn preprocess(&self, question: &str, context: &ConversationContext, attempt: u32)
        -> Query;
}

/// Generates a draft answer grounded in the given evidence
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync + Debug {
    /// Fails with [`WorkflowError::SynthesisFailure`] once its internal retry is spent
    async fn synthesize(
        &self,
        query: &Query,
        evidence: FusedResult,
    ) -> Result<DraftAnswer, WorkflowError>;
}

/// Scores how well an answer is supported by its evidence
#[async_trait]
pub trait FaithfulnessGrader: Send + Sync + Debug {
    /// Faithfulness in [0, 1]
    async fn score(&self, answer: &str, evidence: &FusedResult) -> Result<f32, WorkflowError>;
}

/// Grade a draft against `minimum_score`.
///
/// Drafts without evidence skip the grader and never pass. Grader failures
/// yield a conservative `passed = false`.
pub async fn grade_draft(
    grader: &dyn FaithfulnessGrader,
    draft: DraftAnswer,
    minimum_score: f32,
) -> GradedAnswer {
    if draft.no_evidence {
        return GradedAnswer::ungraded_no_evidence(draft);
    }

    match grader.score(&draft.text, &draft.evidence).await {
        Ok(score) => GradedAnswer::new(draft, score, minimum_score),
        Err(e) => {
            tracing::warn!(error = %e, "Faithfulness grading failed, treating as not passed");
            GradedAnswer::failed_grading(draft, e.to_string())
        }
    }
}

/// Proposes follow-up questions from an answer and its evidence
#[async_trait]
pub trait FollowUpGenerator: Send + Sync + Debug {
    async fn suggest(
        &self,
        question: &str,
        answer: &str,
        evidence: &FusedResult,
        max_questions: usize,
    ) -> Result<Vec<String>, DomainError>;
}

/// Labels the presentation format of an answer
#[async_trait]
pub trait OutputFormatDetector: Send + Sync + Debug {
    async fn detect(&self, question: &str, answer: &str) -> Result<OutputFormat, DomainError>;
}

/// Recognises small talk that needs no retrieval
#[async_trait]
pub trait GreetingDetector: Send + Sync + Debug {
    async fn is_greeting(&self, text: &str) -> Result<bool, DomainError>;
}
