//! Persisted request records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::query_workflow::ContextTurn;

/// Caller-supplied request identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate an id for callers that did not send one
    pub fn generate() -> Self {
        Self(format!("req-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metrics row describing one answered (or failed) request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub request_id: RequestId,
    pub user_id: String,
    pub session_id: String,
    pub prompt: String,
    pub response: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub latency_ms: u64,
    pub attempts: u32,
    pub degraded: bool,
    pub faithfulness_score: Option<f32>,
    /// Error kind when the request failed
    pub error_kind: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// One question/answer exchange in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub request_id: RequestId,
    pub user_id: String,
    pub session_id: String,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(
        request_id: RequestId,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            user_id: user_id.into(),
            session_id: session_id.into(),
            question: question.into(),
            answer: answer.into(),
            created_at: Utc::now(),
        }
    }

    pub fn to_context_turn(&self) -> ContextTurn {
        ContextTurn::new(self.question.clone(), self.answer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_request_ids_are_unique() {
        let a = RequestId::generate();
        let b = RequestId::generate();

        assert_ne!(a, b);
        assert!(a.as_str().starts_with("req-"));
    }

    #[test]
    fn test_turn_to_context() {
        let turn = ConversationTurn::new("r1".into(), "u1", "s1", "What is LoRA?", "A method.");
        let context = turn.to_context_turn();

        assert_eq!(context.question, "What is LoRA?");
        assert_eq!(context.answer, "A method.");
    }
}
