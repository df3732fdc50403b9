//! Interaction and conversation-history records
//!
//! Both are written once per request and keyed by the caller's request id,
//! which acts as the idempotency key.

mod record;
mod repository;

pub use record::{ConversationTurn, InteractionRecord, RequestId};
pub use repository::{ConversationRepository, InteractionRepository};

#[cfg(test)]
pub use repository::{MockConversationRepository, MockInteractionRepository};
