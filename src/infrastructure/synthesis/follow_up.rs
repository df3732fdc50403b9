//! Suggested follow-up questions

use async_trait::async_trait;
use std::sync::Arc;

use super::numbered_evidence;
use crate::domain::llm::{LlmProvider, LlmRequest};
use crate::domain::query_workflow::FollowUpGenerator;
use crate::domain::retrieval::FusedResult;
use crate::domain::DomainError;
use crate::infrastructure::llm::parsing::{extract_json_array, strip_code_fences};

const FOLLOW_UP_PROMPT: &str = r#"A user asked: ${question}

They received this answer:
${answer}

It was based on these sources:
${sources}

Suggest up to ${count} short follow-up questions the user could ask next that the sources can answer.
Respond with a JSON array of strings only."#;

#[derive(Debug)]
pub struct LlmFollowUpGenerator {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl LlmFollowUpGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    fn parse(&self, text: &str, max_questions: usize) -> Result<Vec<String>, DomainError> {
        let body = strip_code_fences(text);
        let json = extract_json_array(body).ok_or_else(|| {
            DomainError::provider(self.provider.provider_name(), "No JSON array in reply")
        })?;

        let questions: Vec<String> = serde_json::from_str(json).map_err(|e| {
            DomainError::provider(
                self.provider.provider_name(),
                format!("Invalid follow-up list: {}", e),
            )
        })?;

        Ok(questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .take(max_questions)
            .collect())
    }
}

#[async_trait]
impl FollowUpGenerator for LlmFollowUpGenerator {
    async fn suggest(
        &self,
        question: &str,
        answer: &str,
        evidence: &FusedResult,
        max_questions: usize,
    ) -> Result<Vec<String>, DomainError> {
        if max_questions == 0 {
            return Ok(Vec::new());
        }

        let request = LlmRequest::builder()
            .user(
                FOLLOW_UP_PROMPT
                    .replace("${question}", question)
                    .replace("${answer}", answer)
                    .replace("${sources}", &numbered_evidence(evidence))
                    .replace("${count}", &max_questions.to_string()),
            )
            .temperature(0.5)
            .build();

        let response = self.provider.chat(&self.model, request).await?;
        self.parse(response.content().unwrap_or_default(), max_questions)
    }
}
