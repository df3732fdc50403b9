//! Output format detection

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::llm::{LlmProvider, LlmRequest};
use crate::domain::query_workflow::{OutputFormat, OutputFormatDetector};
use crate::domain::DomainError;

const FORMAT_PROMPT: &str = r#"Choose the best presentation format for this answer.

Question: ${question}
Answer: ${answer}

- chart: numerical data, trends or distributions worth visualizing
- table: structured comparisons, specifications or row/column data
- code: source code, commands or configuration
- markdown: explanatory text

Respond with one word: chart, table, code or markdown."#;

/// Answer text sent for detection is capped to keep the call cheap
const MAX_ANSWER_CHARS: usize = 1000;

#[derive(Debug)]
pub struct LlmOutputFormatDetector {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl LlmOutputFormatDetector {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl OutputFormatDetector for LlmOutputFormatDetector {
    async fn detect(&self, question: &str, answer: &str) -> Result<OutputFormat, DomainError> {
        let answer: String = answer.chars().take(MAX_ANSWER_CHARS).collect();
        let request = LlmRequest::builder()
            .user(
                FORMAT_PROMPT
                    .replace("${question}", question)
                    .replace("${answer}", &answer),
            )
            .temperature(0.0)
            .max_tokens(5)
            .build();

        let response = self.provider.chat(&self.model, request).await?;
        let label = response
            .content()
            .unwrap_or_default()
            .trim_matches(|c: char| !c.is_alphabetic());

        label.parse().map_err(|_| {
            DomainError::provider(
                self.provider.provider_name(),
                format!("Unknown output format '{}'", label),
            )
        })
    }
}
