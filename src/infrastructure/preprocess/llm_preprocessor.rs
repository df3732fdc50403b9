//! LLM-backed query preprocessor
//!
//! Rewrites the question (optionally using prior turns), expands it into
//! paraphrases and synthesizes a hypothetical answer whose embedding steers
//! vector search. Every step degrades to the plain question on failure.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::embedding::{embed_text, EmbeddingProvider};
use crate::domain::llm::{LlmProvider, LlmRequest};
use crate::domain::query_workflow::{
    ConversationContext, PreprocessOptions, Query, QueryPreprocessor,
};
use crate::domain::DomainError;
use crate::infrastructure::llm::parsing::strip_label;

const REWRITE_PROMPT: &str = r#"You are an expert in query understanding and reformulation.

${context}Original query: "${query}"

Rewrite the query so it is self-contained, specific and easy to search:
- keep the original intent and constraints
- resolve pronouns and ellipsis using the conversation, if any
- expand abbreviations and make implicit concepts explicit
${retry}
Return only the rewritten query, no explanations."#;

const RETRY_HINT: &str = "- a previous search with this query found poorly supporting evidence; broaden the wording and use alternative terminology";

const EXPANSION_PROMPT: &str = r#"Generate ${count} alternative search queries that are semantically similar to the original query.
Each query must keep the same intent, use different but related terms, and be a complete question.
One query per line, no numbering, no quotes, no extra text.

Original query: "${query}""#;

const HYPOTHETICAL_PROMPT: &str = r#"Write a 2-3 sentence answer to the question below that contains the key terms, synonyms and related concepts a matching document would use.
It is only used to find documents, never shown to a user. No hedging, no lists, no citations.

Question: "${query}""#;

const ANSWER_LABELS: &[&str] = &[
    "Here's the answer:",
    "Hypothetical answer:",
    "Answer:",
    "Response:",
];

const REWRITE_LABELS: &[&str] = &["Rewritten query:", "Query:"];

/// Query preprocessor driven by a chat model
#[derive(Debug)]
pub struct LlmQueryPreprocessor {
    llm: Arc<dyn LlmProvider>,
    embeddings: Arc<dyn EmbeddingProvider>,
    model: String,
    options: PreprocessOptions,
}

impl LlmQueryPreprocessor {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        embeddings: Arc<dyn EmbeddingProvider>,
        model: impl Into<String>,
        options: PreprocessOptions,
    ) -> Self {
        Self {
            llm,
            embeddings,
            model: model.into(),
            options,
        }
    }

    /// Sampling temperature grows with each retry so repeated attempts diverge
    fn temperature(attempt: u32) -> f32 {
        (attempt as f32 * 0.3).min(0.9)
    }

    async fn complete(&self, prompt: String, attempt: u32) -> Result<String, DomainError> {
        let request = LlmRequest::builder()
            .user(prompt)
            .temperature(Self::temperature(attempt))
            .max_tokens(300)
            .build();

        let response = self.llm.chat(&self.model, request).await?;
        response
            .content()
            .map(str::to_string)
            .ok_or_else(|| DomainError::provider(self.llm.provider_name(), "Empty response"))
    }

    async fn rewrite(
        &self,
        question: &str,
        context: &ConversationContext,
        attempt: u32,
    ) -> Result<String, DomainError> {
        let context_block = if context.is_empty() {
            String::new()
        } else {
            format!("Conversation so far:\n{}\n\n", context.transcript())
        };
        let retry = if attempt > 0 { RETRY_HINT } else { "" };

        let prompt = REWRITE_PROMPT
            .replace("${context}", &context_block)
            .replace("${query}", question)
            .replace("${retry}", retry);

        let rewritten = strip_label(&self.complete(prompt, attempt).await?, REWRITE_LABELS);
        if rewritten.is_empty() {
            return Err(DomainError::validation("Rewriter returned an empty query"));
        }
        Ok(rewritten)
    }

    async fn expand(&self, query: &str, attempt: u32) -> Vec<String> {
        if self.options.max_expansions == 0 {
            return Vec::new();
        }

        let prompt = EXPANSION_PROMPT
            .replace("${count}", &self.options.max_expansions.to_string())
            .replace("${query}", query);

        match self.complete(prompt, attempt).await {
            Ok(text) => text
                .lines()
                .map(|line| line.trim().trim_start_matches(['-', '*']).trim())
                .filter(|line| !line.is_empty())
                .map(|line| line.trim_matches('"').to_string())
                .take(self.options.max_expansions)
                .collect(),
            Err(e) => {
                warn!(error = %e, "Query expansion failed");
                Vec::new()
            }
        }
    }

    async fn hypothetical_embedding(&self, query: &str, attempt: u32) -> Option<Vec<f32>> {
        let prompt = HYPOTHETICAL_PROMPT.replace("${query}", query);
        let answer = match self.complete(prompt, attempt).await {
            Ok(text) => strip_label(&text, ANSWER_LABELS),
            Err(e) => {
                warn!(error = %e, "Hypothetical answer generation failed");
                return None;
            }
        };

        if answer.is_empty() {
            return None;
        }

        match embed_text(self.embeddings.as_ref(), &answer).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!(error = %e, "Hypothetical answer embedding failed, using plain query");
                None
            }
        }
    }
}

#[async_trait]
impl QueryPreprocessor for LlmQueryPreprocessor {
    async fn preprocess(
        &self,
        question: &str,
        context: &ConversationContext,
        attempt: u32,
    ) -> Query {
        let retry = attempt > 0;
        let rewrite = self.options.rewrite_enabled || retry;
        let expand = self.options.expansion_enabled || (retry && self.options.rewrite_enabled);

        let primary = if rewrite {
            match self.rewrite(question, context, attempt).await {
                Ok(rewritten) => Some(rewritten),
                Err(e) => {
                    warn!(attempt, error = %e, "Query rewrite failed, using original query");
                    None
                }
            }
        } else {
            None
        };
        let search_text = primary.as_deref().unwrap_or(question);

        let (expansions, hypothetical) = tokio::join!(
            async {
                if expand {
                    self.expand(search_text, attempt).await
                } else {
                    Vec::new()
                }
            },
            async {
                if self.options.hypothetical_answer_enabled {
                    self.hypothetical_embedding(search_text, attempt).await
                } else {
                    None
                }
            }
        );

        if primary.is_none() && expansions.is_empty() {
            debug!(attempt, "Preprocessing left the query text unchanged");
            return Query::new(question, Vec::new(), hypothetical);
        }

        let mut variants = Vec::with_capacity(expansions.len() + 1);
        variants.push(search_text.to_string());
        variants.extend(expansions);

        debug!(
            attempt,
            variants = variants.len(),
            hypothetical = hypothetical.is_some(),
            "Query preprocessed"
        );
        Query::new(question, variants, hypothetical)
    }
}
