//! LLM fact-check grader

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::numbered_evidence;
use crate::domain::llm::{LlmProvider, LlmRequest};
use crate::domain::query_workflow::{FaithfulnessGrader, WorkflowError};
use crate::domain::retrieval::FusedResult;
use crate::infrastructure::llm::parsing::unit_score;

const GRADING_PROMPT: &str = r#"You are a fact-checker verifying that an answer is supported by its sources.

Answer to verify:
${answer}

Sources:
${sources}

Score the answer:
1. Source alignment (40 points): statements are quoted, paraphrased or directly inferable from the sources.
2. Factual accuracy (30 points): facts, terms and numbers match the sources.
3. Integrity (20 points): no unsupported claims.
4. Consistency (10 points): no contradiction with the sources.

Sum the points and divide by 100.
Return ONLY the final decimal score between 0.0 and 1.0, for example 0.86"#;

/// Grades at temperature 0 so identical inputs score identically
#[derive(Debug)]
pub struct LlmFaithfulnessGrader {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl LlmFaithfulnessGrader {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl FaithfulnessGrader for LlmFaithfulnessGrader {
    async fn score(&self, answer: &str, evidence: &FusedResult) -> Result<f32, WorkflowError> {
        let request = LlmRequest::builder()
            .user(
                GRADING_PROMPT
                    .replace("${answer}", answer)
                    .replace("${sources}", &numbered_evidence(evidence)),
            )
            .temperature(0.0)
            .max_tokens(10)
            .build();

        let response = self
            .provider
            .chat(&self.model, request)
            .await
            .map_err(|e| WorkflowError::grading_failure(e.to_string()))?;

        let text = response.content().unwrap_or_default();
        let score = unit_score(text).ok_or_else(|| {
            WorkflowError::grading_failure(format!("Grade is not a score in [0, 1]: '{}'", text))
        })?;

        debug!(score = score, "Faithfulness graded");
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::{MockLlmProvider, Usage};
    use crate::domain::query_workflow::{grade_draft, DraftAnswer};
    use crate::domain::retrieval::{EvidenceChunk, EvidenceOrigin};

    fn evidence() -> FusedResult {
        FusedResult::from_ranked(
            vec![EvidenceChunk::new("doc-1", "LoRA freezes weights", EvidenceOrigin::Vector, 0.9)],
            5,
        )
    }

    #[tokio::test]
    async fn test_parses_decimal_score() {
        let provider = Arc::new(MockLlmProvider::new("mock").with_content("Score: 0.86"));
        let grader = LlmFaithfulnessGrader::new(provider.clone(), "grader");

        let score = grader.score("LoRA freezes weights [1]", &evidence()).await.unwrap();

        assert!((score - 0.86).abs() < f32::EPSILON);
        assert_eq!(provider.requests()[0].temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_out_of_scale_reply_is_grading_failure() {
        for reply in ["1.7", "I rate it 6 out of 10", "Score: 55/100", "2 of 4 claims are supported"] {
            let provider = Arc::new(MockLlmProvider::new("mock").with_content(reply));
            let grader = LlmFaithfulnessGrader::new(provider, "grader");

            let err = grader.score("a", &evidence()).await.unwrap_err();
            assert_eq!(err.kind(), "grading_failure", "{}", reply);
        }
    }

    #[tokio::test]
    async fn test_out_of_scale_reply_does_not_pass_gate() {
        let provider = Arc::new(MockLlmProvider::new("mock").with_content("I rate it 6 out of 10"));
        let grader = LlmFaithfulnessGrader::new(provider, "grader");
        let draft = DraftAnswer::new("LoRA freezes weights [1]", evidence(), "m", Usage::default(), 1);

        let graded = grade_draft(&grader, draft, 0.7).await;

        assert!(!graded.passed);
        assert!(graded.grading_error.is_some());
    }

    #[tokio::test]
    async fn test_grading_is_idempotent() {
        let provider = Arc::new(MockLlmProvider::new("mock").with_content("0.72"));
        let grader = LlmFaithfulnessGrader::new(provider.clone(), "grader");

        let first = grader.score("answer [1]", &evidence()).await.unwrap();
        let second = grader.score("answer [1]", &evidence()).await.unwrap();

        assert!((first - second).abs() < 1e-6);
        assert_eq!(first >= 0.7, second >= 0.7);

        let requests = provider.requests();
        assert_eq!(requests[0].prompt_text(), requests[1].prompt_text());
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_grading_failure() {
        let provider = Arc::new(MockLlmProvider::new("mock").with_content("looks fine"));
        let grader = LlmFaithfulnessGrader::new(provider, "grader");

        let err = grader.score("a", &evidence()).await.unwrap_err();
        assert_eq!(err.kind(), "grading_failure");
    }

    #[tokio::test]
    async fn test_provider_error_is_grading_failure() {
        let provider = Arc::new(MockLlmProvider::new("mock").with_error("timeout"));
        let grader = LlmFaithfulnessGrader::new(provider, "grader");

        let err = grader.score("a", &evidence()).await.unwrap_err();
        assert_eq!(err.kind(), "grading_failure");
    }
}
