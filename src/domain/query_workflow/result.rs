//! Final workflow output

use serde::{Deserialize, Serialize};

use super::{Citation, HallucinationRisk, OutputFormat, WorkflowAttempt, WorkflowState};
use crate::domain::llm::Usage;

/// Reply to a message classified as a greeting
pub const GREETING_ANSWER: &str = "Hello! How can I help you today?";

/// Outcome of a completed (possibly degraded) run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_questions: Option<Vec<String>>,
    /// No attempt passed grading within the retry budget
    pub degraded: bool,
    /// Number of attempts run, `1..=max_retries + 1`; 0 for a greeting
    pub attempts: u32,
    /// Attempt that produced `answer`
    pub answer_attempt: u32,
    pub faithfulness_score: f32,
    pub hallucination_risk: HallucinationRisk,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    /// Model that generated the returned answer
    pub model: String,
    /// Token usage summed over every attempt
    pub usage: Usage,
    pub history: Vec<WorkflowAttempt>,
    pub transitions: Vec<WorkflowState>,
}

impl WorkflowResult {
    /// Canned reply for a greeting; no retrieval or generation took place
    pub fn greeting() -> Self {
        Self {
            answer: GREETING_ANSWER.to_string(),
            citations: None,
            suggested_questions: None,
            degraded: false,
            attempts: 0,
            answer_attempt: 0,
            faithfulness_score: 1.0,
            hallucination_risk: HallucinationRisk::Low,
            output_format: None,
            model: String::new(),
            usage: Usage::default(),
            history: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn answering_attempt(&self) -> Option<&WorkflowAttempt> {
        self.history.iter().find(|a| a.index == self.answer_attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_result() {
        let result = WorkflowResult::greeting();

        assert_eq!(result.answer, GREETING_ANSWER);
        assert_eq!(result.attempts, 0);
        assert!(!result.degraded);
        assert!(result.answering_attempt().is_none());
        assert_eq!(result.hallucination_risk, HallucinationRisk::Low);
    }
}
