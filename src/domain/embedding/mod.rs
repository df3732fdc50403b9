//! Embedding provider domain models and traits

mod provider;
mod request;
mod response;

pub use provider::{embed_text, EmbeddingProvider};
pub use request::EmbeddingRequest;
pub use response::{cosine_similarity, Embedding, EmbeddingResponse};

#[cfg(test)]
pub use provider::mock::MockEmbeddingProvider;
