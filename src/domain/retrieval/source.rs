//! Retrieval source trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::{EvidenceChunk, EvidenceOrigin};
use crate::domain::DomainError;

/// One search request sent to a single source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceQuery {
    /// Query text
    pub text: String,
    /// Precomputed embedding to search with instead of embedding `text`
    pub embedding: Option<Vec<f32>>,
    /// Maximum hits to return
    pub limit: usize,
}

impl SourceQuery {
    pub fn text(text: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            embedding: None,
            limit,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// A search backend consumed by the fusion engine.
///
/// Implementations return hits ranked best first. Failures are reported per
/// call; the engine decides whether they are fatal.
#[async_trait]
pub trait RetrievalSource: Send + Sync + Debug {
    async fn search(&self, query: &SourceQuery) -> Result<Vec<EvidenceChunk>, DomainError>;

    /// Origin tag stamped on every chunk this source returns
    fn origin(&self) -> EvidenceOrigin;

    /// Name used in logs and metrics
    fn source_name(&self) -> &str;

    /// Whether [`SourceQuery::embedding`] is honored
    fn accepts_embeddings(&self) -> bool {
        false
    }

    /// How many query variants to send; metered APIs search the primary text only
    fn max_query_variants(&self) -> usize {
        usize::MAX
    }
}
