//! Domain layer - Core types, policies and collaborator traits

pub mod embedding;
pub mod error;
pub mod interaction;
pub mod llm;
pub mod query_workflow;
pub mod retrieval;

pub use embedding::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
pub use error::DomainError;
pub use interaction::{
    ConversationRepository, ConversationTurn, InteractionRecord, InteractionRepository, RequestId,
};
pub use llm::{LlmProvider, LlmRequest, LlmResponse, Message, MessageRole, Usage};
pub use query_workflow::{
    Citation, ConversationContext, DraftAnswer, GradedAnswer, Query, QuerySettings,
    QueryWorkflowConfig, WorkflowError, WorkflowResult, WorkflowState,
};
pub use retrieval::{
    EvidenceChunk, EvidenceOrigin, FusedResult, RelevanceFilter, Reranker, RetrievalSource,
    SourceQuery,
};
