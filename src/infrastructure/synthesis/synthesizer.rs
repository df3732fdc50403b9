//! Evidence-grounded answer generation

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::numbered_evidence;
use crate::domain::llm::{LlmProvider, LlmRequest, LlmResponse};
use crate::domain::query_workflow::{AnswerSynthesizer, DraftAnswer, Query, WorkflowError};
use crate::domain::retrieval::FusedResult;
use crate::domain::DomainError;

const SYSTEM_PROMPT: &str = "You answer questions using only the numbered sources provided. \
Do not state facts that are not contained in the sources. \
Cite the sources you use with their number in square brackets, for example [1] or [2][3]. \
If the sources do not contain the answer, say that you do not have enough information.";

const USER_PROMPT: &str = r#"Sources:
${sources}

Question: ${question}

Answer:"#;

/// Calls made before a synthesis failure is surfaced
const SYNTHESIS_CALLS: usize = 2;

#[derive(Debug)]
pub struct LlmAnswerSynthesizer {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f32,
}

impl LlmAnswerSynthesizer {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
        }
    }

    fn build_request(&self, query: &Query, evidence: &FusedResult) -> LlmRequest {
        let question = if query.primary_text() == query.original() {
            query.original().to_string()
        } else {
            format!("{}\n(Interpreted as: {})", query.original(), query.primary_text())
        };

        LlmRequest::builder()
            .system(SYSTEM_PROMPT)
            .user(
                USER_PROMPT
                    .replace("${sources}", &numbered_evidence(evidence))
                    .replace("${question}", &question),
            )
            .temperature(self.temperature)
            .build()
    }

    async fn call(&self, request: LlmRequest) -> Result<(String, LlmResponse), DomainError> {
        let response = self.provider.chat(&self.model, request).await?;
        let text = response
            .content()
            .map(str::to_string)
            .ok_or_else(|| DomainError::provider(self.provider.provider_name(), "Empty answer"))?;
        Ok((text, response))
    }
}

#[async_trait]
impl AnswerSynthesizer for LlmAnswerSynthesizer {
    async fn synthesize(
        &self,
        query: &Query,
        evidence: FusedResult,
    ) -> Result<DraftAnswer, WorkflowError> {
        if evidence.is_empty() {
            debug!("No evidence, returning insufficient information answer");
            return Ok(DraftAnswer::insufficient_information());
        }

        let request = self.build_request(query, &evidence);
        let started = Instant::now();
        let mut last_error = None;

        for call in 1..=SYNTHESIS_CALLS {
            match self.call(request.clone()).await {
                Ok((text, response)) => {
                    return Ok(DraftAnswer::new(
                        text,
                        evidence,
                        response.model,
                        response.usage.unwrap_or_default(),
                        started.elapsed().as_millis() as u64,
                    ));
                }
                Err(e) => {
                    warn!(call = call, error = %e, "Answer synthesis call failed");
                    last_error = Some(e);
                }
            }
        }

        Err(WorkflowError::synthesis_failure(
            last_error.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::MockLlmProvider;
    use crate::domain::retrieval::{EvidenceChunk, EvidenceOrigin};

    fn evidence() -> FusedResult {
        FusedResult::from_ranked(
            vec![EvidenceChunk::new(
                "doc-lora",
                "LoRA adds trainable low-rank matrices to frozen weights.",
                EvidenceOrigin::Vector,
                0.9,
            )],
            5,
        )
    }

    #[tokio::test]
    async fn test_synthesizes_from_numbered_evidence() {
        let provider = Arc::new(MockLlmProvider::new("mock").with_content("LoRA is low-rank [1]."));
        let synthesizer = LlmAnswerSynthesizer::new(provider.clone(), "gpt-4o-mini", 0.1);

        let draft = synthesizer
            .synthesize(&Query::plain("What is LORA?"), evidence())
            .await
            .unwrap();

        assert_eq!(draft.text, "LoRA is low-rank [1].");
        assert_eq!(draft.model, "gpt-4o-mini");
        assert_eq!(draft.usage.total_tokens, 15);
        assert!(!draft.no_evidence);

        let prompt = provider.requests()[0].prompt_text();
        assert!(prompt.contains("[1] (doc-lora)"));
        assert!(prompt.contains("What is LORA?"));
    }

    #[tokio::test]
    async fn test_empty_evidence_skips_model() {
        let provider = Arc::new(MockLlmProvider::new("mock").with_content("unused"));
        let synthesizer = LlmAnswerSynthesizer::new(provider.clone(), "m", 0.1);

        let draft = synthesizer
            .synthesize(&Query::plain("q"), FusedResult::empty())
            .await
            .unwrap();

        assert!(draft.no_evidence);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_retries_once_internally() {
        let provider = Arc::new(
            MockLlmProvider::new("mock")
                .then_error("rate limited")
                .with_content("second try [1]"),
        );
        let synthesizer = LlmAnswerSynthesizer::new(provider.clone(), "m", 0.1);

        let draft = synthesizer.synthesize(&Query::plain("q"), evidence()).await.unwrap();

        assert_eq!(draft.text, "second try [1]");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_second_failure_is_synthesis_failure() {
        let provider = Arc::new(MockLlmProvider::new("mock").with_error("down"));
        let synthesizer = LlmAnswerSynthesizer::new(provider.clone(), "m", 0.1);

        let err = synthesizer
            .synthesize(&Query::plain("q"), evidence())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "synthesis_failure");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_rewritten_query_is_shown() {
        let provider = Arc::new(MockLlmProvider::new("mock").with_content("ok"));
        let synthesizer = LlmAnswerSynthesizer::new(provider.clone(), "m", 0.1);
        let query = Query::new("and its rank?", vec!["What rank does LoRA use?".to_string()], None);

        synthesizer.synthesize(&query, evidence()).await.unwrap();

        assert!(provider.requests()[0]
            .prompt_text()
            .contains("Interpreted as: What rank does LoRA use?"));
    }
}
