//! Secondary re-scoring of merged evidence

use async_trait::async_trait;
use std::fmt::Debug;

use super::EvidenceChunk;
use crate::domain::DomainError;

/// Re-scores candidates against the query with a stronger relevance model.
///
/// Returns the same chunks with new scores; ordering is up to the caller.
#[async_trait]
pub trait Reranker: Send + Sync + Debug {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<EvidenceChunk>,
    ) -> Result<Vec<EvidenceChunk>, DomainError>;

    fn reranker_name(&self) -> &'static str;
}
