//! In-memory repositories
//!
//! Useful for testing and development. Data is lost when the process terminates.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::interaction::{
    ConversationRepository, ConversationTurn, InteractionRecord, InteractionRepository,
};
use crate::domain::DomainError;

fn lock_error(e: impl std::fmt::Display) -> DomainError {
    DomainError::storage(format!("Failed to acquire lock: {}", e))
}

#[derive(Debug, Default)]
pub struct InMemoryInteractionRepository {
    records: RwLock<HashMap<String, InteractionRecord>>,
}

impl InMemoryInteractionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl InteractionRepository for InMemoryInteractionRepository {
    async fn insert_once(&self, record: InteractionRecord) -> Result<bool, DomainError> {
        let mut records = self.records.write().map_err(lock_error)?;
        let key = record.request_id.as_str().to_string();

        if records.contains_key(&key) {
            return Ok(false);
        }

        records.insert(key, record);
        Ok(true)
    }

    async fn find_by_request_id(
        &self,
        request_id: &str,
    ) -> Result<Option<InteractionRecord>, DomainError> {
        let records = self.records.read().map_err(lock_error)?;
        Ok(records.get(request_id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryConversationRepository {
    turns: RwLock<Vec<ConversationTurn>>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn insert_once(&self, turn: ConversationTurn) -> Result<bool, DomainError> {
        let mut turns = self.turns.write().map_err(lock_error)?;

        if turns.iter().any(|t| t.request_id == turn.request_id) {
            return Ok(false);
        }

        turns.push(turn);
        Ok(true)
    }

    async fn recent_turns(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, DomainError> {
        let turns = self.turns.read().map_err(lock_error)?;

        let session: Vec<&ConversationTurn> = turns
            .iter()
            .filter(|t| t.user_id == user_id && t.session_id == session_id)
            .collect();

        let skip = session.len().saturating_sub(limit);
        Ok(session.into_iter().skip(skip).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interaction::RequestId;
    use chrono::Utc;

    fn record(request_id: &str) -> InteractionRecord {
        InteractionRecord {
            request_id: RequestId::new(request_id),
            user_id: "u1".to_string(),
            session_id: "s1".to_string(),
            prompt: "What is LoRA?".to_string(),
            response: "A fine-tuning method.".to_string(),
            model: "gpt-4o-mini".to_string(),
            prompt_tokens: 100,
            completion_tokens: 20,
            total_tokens: 120,
            latency_ms: 900,
            attempts: 1,
            degraded: false,
            faithfulness_score: Some(0.9),
            error_kind: None,
            started_at: Utc::now(),
            completed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_interaction_insert_is_idempotent() {
        let repo = InMemoryInteractionRepository::new();

        assert!(repo.insert_once(record("req-1")).await.unwrap());
        assert!(!repo.insert_once(record("req-1")).await.unwrap());
        assert_eq!(repo.len(), 1);

        let found = repo.find_by_request_id("req-1").await.unwrap();
        assert_eq!(found.unwrap().total_tokens, 120);
        assert!(repo.find_by_request_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recent_turns_oldest_first_and_limited() {
        let repo = InMemoryConversationRepository::new();
        for i in 0..4 {
            let turn = ConversationTurn::new(
                RequestId::new(format!("req-{}", i)),
                "u1",
                "s1",
                format!("q{}", i),
                format!("a{}", i),
            );
            repo.insert_once(turn).await.unwrap();
        }
        repo.insert_once(ConversationTurn::new("other".into(), "u1", "s2", "x", "y"))
            .await
            .unwrap();

        let turns = repo.recent_turns("u1", "s1", 2).await.unwrap();
        let questions: Vec<_> = turns.iter().map(|t| t.question.as_str()).collect();

        assert_eq!(questions, vec!["q2", "q3"]);
    }

    #[tokio::test]
    async fn test_conversation_insert_is_idempotent() {
        let repo = InMemoryConversationRepository::new();
        let turn = ConversationTurn::new("req-1".into(), "u1", "s1", "q", "a");

        assert!(repo.insert_once(turn.clone()).await.unwrap());
        assert!(!repo.insert_once(turn).await.unwrap());
        assert_eq!(repo.recent_turns("u1", "s1", 10).await.unwrap().len(), 1);
    }
}
