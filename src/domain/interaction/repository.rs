//! Repository traits for request records

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::{ConversationTurn, InteractionRecord};
use crate::domain::DomainError;

/// Store for per-request interaction records
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InteractionRepository: Send + Sync {
    /// Insert a record unless its request id is already stored.
    ///
    /// Returns `false` when the request id was already present.
    async fn insert_once(&self, record: InteractionRecord) -> Result<bool, DomainError>;

    async fn find_by_request_id(
        &self,
        request_id: &str,
    ) -> Result<Option<InteractionRecord>, DomainError>;
}

/// Store for conversation history
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Insert a turn unless its request id is already stored.
    ///
    /// Returns `false` when the request id was already present.
    async fn insert_once(&self, turn: ConversationTurn) -> Result<bool, DomainError>;

    /// Most recent `limit` turns of a session, oldest first
    async fn recent_turns(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, DomainError>;
}
