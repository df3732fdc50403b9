//! LLM-based relevance reranker
//!
//! Asks the model for a 0-10 relevance score per chunk and normalizes it to
//! [0, 1]. A chunk whose rescoring fails, or comes back off that scale,
//! keeps its retrieval score.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::llm::{LlmProvider, LlmRequest};
use crate::domain::retrieval::{EvidenceChunk, Reranker};
use crate::domain::DomainError;
use crate::infrastructure::llm::parsing::extract_json_object;

const RERANK_PROMPT: &str = r#"You are evaluating whether a passage helps answer a question.

Question: ${query}

Passage:
${content}

Rate the relevance of the passage to the question from 0 (irrelevant) to 10 (directly answers it).
Respond with JSON only: {"score": <0-10>, "reason": "<short reason>"}"#;

#[derive(Debug, Deserialize)]
struct RerankScore {
    score: f32,
    #[serde(default)]
    reason: Option<String>,
}

/// Cross-encoder style reranker backed by a chat model
#[derive(Debug)]
pub struct LlmReranker {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl LlmReranker {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    fn build_prompt(query: &str, chunk: &EvidenceChunk) -> String {
        RERANK_PROMPT
            .replace("${query}", query)
            .replace("${content}", chunk.content())
    }

    async fn score_chunk(&self, query: &str, chunk: &EvidenceChunk) -> Result<f32, DomainError> {
        let request = LlmRequest::builder()
            .user(Self::build_prompt(query, chunk))
            .temperature(0.0)
            .max_tokens(150)
            .build();

        let response = self.provider.chat(&self.model, request).await?;
        let content = response
            .content()
            .ok_or_else(|| DomainError::provider("llm_reranker", "Empty response from LLM"))?;

        let json = extract_json_object(content).unwrap_or(content);
        let parsed: RerankScore = serde_json::from_str(json).map_err(|e| {
            DomainError::validation(format!("Invalid rerank response format: {}", e))
        })?;

        if !(0.0..=10.0).contains(&parsed.score) {
            return Err(DomainError::validation(format!(
                "Rerank score {} is outside 0-10",
                parsed.score
            )));
        }

        debug!(
            source_id = chunk.source_id(),
            raw = parsed.score,
            reason = parsed.reason.as_deref().unwrap_or(""),
            "Chunk reranked"
        );

        Ok(parsed.score / 10.0)
    }
}

#[async_trait]
impl Reranker for LlmReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<EvidenceChunk>,
    ) -> Result<Vec<EvidenceChunk>, DomainError> {
        let scores = join_all(candidates.iter().map(|chunk| self.score_chunk(query, chunk))).await;

        Ok(candidates
            .iter()
            .zip(scores)
            .map(|(chunk, score)| match score {
                Ok(score) => chunk.rescored(score),
                Err(e) => {
                    warn!(source_id = chunk.source_id(), error = %e, "Rerank failed, keeping retrieval score");
                    chunk.clone()
                }
            })
            .collect())
    }

    fn reranker_name(&self) -> &'static str {
        "llm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::MockLlmProvider;
    use crate::domain::retrieval::EvidenceOrigin;

    fn chunk(id: &str, score: f32) -> EvidenceChunk {
        EvidenceChunk::new(id, format!("passage {}", id), EvidenceOrigin::Vector, score)
    }

    #[tokio::test]
    async fn test_scores_are_normalized() {
        let provider = Arc::new(
            MockLlmProvider::new("mock")
                .with_content(r#"Sure: {"score": 9, "reason": "directly relevant"}"#),
        );
        let reranker = LlmReranker::new(provider.clone(), "gpt-4o-mini");

        let reranked = reranker
            .rerank("What is LORA?", vec![chunk("a", 0.2), chunk("b", 0.3)])
            .await
            .unwrap();

        assert_eq!(reranked.len(), 2);
        assert!((reranked[0].score() - 0.9).abs() < 1e-6);
        assert_eq!(provider.call_count(), 2);
        assert!(provider.requests()[0].prompt_text().contains("What is LORA?"));
    }

    #[tokio::test]
    async fn test_failed_chunk_keeps_original_score() {
        let provider = Arc::new(MockLlmProvider::new("mock").with_content("not json at all"));
        let reranker = LlmReranker::new(provider, "m");

        let reranked = reranker.rerank("q", vec![chunk("a", 0.42)]).await.unwrap();

        assert_eq!(reranked[0].score(), 0.42);
    }

    #[tokio::test]
    async fn test_out_of_range_score_keeps_retrieval_score() {
        for reply in [r#"{"score": 14}"#, r#"{"score": -2}"#] {
            let provider = Arc::new(MockLlmProvider::new("mock").with_content(reply));
            let reranker = LlmReranker::new(provider, "m");

            let reranked = reranker.rerank("q", vec![chunk("a", 0.1)]).await.unwrap();

            assert_eq!(reranked[0].score(), 0.1, "{}", reply);
        }
    }
}
