//! Retrieval source and reranker implementations

mod graph;
mod in_memory;
mod pgvector;
mod reranker;
mod web;

pub use graph::HttpGraphSource;
pub use in_memory::{CorpusDocument, InMemoryVectorSource};
pub use pgvector::PgVectorSource;
pub use reranker::LlmReranker;
pub use web::TavilyWebSource;

/// Map a cosine distance in [0, 2] to a similarity in [0, 1]
pub(crate) fn cosine_distance_to_similarity(distance: f64) -> f32 {
    (1.0 - distance / 2.0).clamp(0.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_similarity() {
        assert_eq!(cosine_distance_to_similarity(0.0), 1.0);
        assert_eq!(cosine_distance_to_similarity(1.0), 0.5);
        assert_eq!(cosine_distance_to_similarity(2.0), 0.0);
        assert_eq!(cosine_distance_to_similarity(2.5), 0.0);
        assert_eq!(cosine_distance_to_similarity(-0.1), 1.0);
    }
}
