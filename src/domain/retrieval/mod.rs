//! Retrieval domain
//!
//! Evidence chunks returned by search sources, the fusion merge policy and the
//! relevance filter applied before synthesis.

mod chunk;
mod filter;
mod fused;
mod rerank;
mod source;

pub use chunk::{EvidenceChunk, EvidenceOrigin};
pub use filter::RelevanceFilter;
pub use fused::{merge_candidates, FusedResult};
pub use rerank::Reranker;
pub use source::{RetrievalSource, SourceQuery};

#[cfg(test)]
pub use rerank::mock::MockReranker;
#[cfg(test)]
pub use source::mock::MockRetrievalSource;
