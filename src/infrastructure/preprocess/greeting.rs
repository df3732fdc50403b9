//! Greeting classification

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::llm::{LlmProvider, LlmRequest};
use crate::domain::query_workflow::GreetingDetector;
use crate::domain::DomainError;

const GREETING_PROMPT: &str = r#"Is the following message only a greeting or small talk, with no question to research?

Message: '${text}'

Respond with one word: true or false."#;

/// Messages longer than this are never treated as greetings
const MAX_GREETING_CHARS: usize = 80;

#[derive(Debug)]
pub struct LlmGreetingDetector {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl LlmGreetingDetector {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl GreetingDetector for LlmGreetingDetector {
    async fn is_greeting(&self, text: &str) -> Result<bool, DomainError> {
        if text.chars().count() > MAX_GREETING_CHARS {
            return Ok(false);
        }

        let request = LlmRequest::builder()
            .user(GREETING_PROMPT.replace("${text}", text))
            .temperature(0.0)
            .max_tokens(5)
            .build();

        let response = self.provider.chat(&self.model, request).await?;
        let verdict = response
            .content()
            .unwrap_or_default()
            .trim_matches(|c: char| !c.is_alphabetic())
            .to_lowercase();

        match verdict.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(DomainError::provider(
                self.provider.provider_name(),
                format!("Unexpected greeting verdict '{}'", other),
            )),
        }
    }
}
