//! In-process vector index for development and tests

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::cosine_distance_to_similarity;
use crate::domain::embedding::{cosine_similarity, embed_text, EmbeddingProvider, EmbeddingRequest};
use crate::domain::retrieval::{EvidenceChunk, EvidenceOrigin, RetrievalSource, SourceQuery};
use crate::domain::DomainError;

/// A document to index
#[derive(Debug, Clone, Deserialize)]
pub struct CorpusDocument {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone)]
struct IndexedDocument {
    document: CorpusDocument,
    vector: Vec<f32>,
}

/// Brute-force cosine search over embedded documents held in memory
#[derive(Debug)]
pub struct InMemoryVectorSource {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    documents: RwLock<Vec<IndexedDocument>>,
}

impl InMemoryVectorSource {
    pub fn new(embedding_provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedding_provider,
            documents: RwLock::new(Vec::new()),
        }
    }

    /// Embed and index documents, replacing any with the same id
    pub async fn add_documents(&self, documents: Vec<CorpusDocument>) -> Result<usize, DomainError> {
        if documents.is_empty() {
            return Ok(0);
        }

        let request = EmbeddingRequest::batch(
            self.embedding_provider.default_model(),
            documents.iter().map(|d| d.content.clone()).collect(),
        );
        let vectors = self.embedding_provider.embed(request).await?.into_vectors();
        if vectors.len() != documents.len() {
            return Err(DomainError::embedding("Embedding count does not match documents"));
        }

        let mut index = self.documents.write().await;
        let count = documents.len();
        for (document, vector) in documents.into_iter().zip(vectors) {
            index.retain(|d| d.document.id != document.id);
            index.push(IndexedDocument { document, vector });
        }

        Ok(count)
    }

    /// Load a JSON array of `{id, content, title?}` documents
    pub async fn load_corpus_file(&self, path: &Path) -> Result<usize, DomainError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            DomainError::configuration(format!("Failed to read corpus {}: {}", path.display(), e))
        })?;
        let documents: Vec<CorpusDocument> = serde_json::from_str(&raw).map_err(|e| {
            DomainError::configuration(format!("Invalid corpus {}: {}", path.display(), e))
        })?;

        self.add_documents(documents).await
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }
}

#[async_trait]
impl RetrievalSource for InMemoryVectorSource {
    async fn search(&self, query: &SourceQuery) -> Result<Vec<EvidenceChunk>, DomainError> {
        let embedding = match &query.embedding {
            Some(embedding) => embedding.clone(),
            None => embed_text(self.embedding_provider.as_ref(), &query.text).await?,
        };

        let index = self.documents.read().await;
        let mut scored: Vec<(f32, &IndexedDocument)> = index
            .iter()
            .map(|doc| {
                let cosine = cosine_similarity(&embedding, &doc.vector) as f64;
                (cosine_distance_to_similarity(1.0 - cosine), doc)
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(query.limit)
            .enumerate()
            .map(|(rank, (score, doc))| {
                let mut chunk = EvidenceChunk::new(
                    doc.document.id.clone(),
                    doc.document.content.clone(),
                    EvidenceOrigin::Vector,
                    score,
                )
                .with_rank(rank);
                if let Some(title) = &doc.document.title {
                    chunk = chunk.with_title(title.clone());
                }
                chunk
            })
            .collect())
    }

    fn origin(&self) -> EvidenceOrigin {
        EvidenceOrigin::Vector
    }

    fn source_name(&self) -> &str {
        "in_memory_vector"
    }

    fn accepts_embeddings(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::embedding::MockEmbeddingProvider;

    fn doc(id: &str, content: &str) -> CorpusDocument {
        CorpusDocument {
            id: id.to_string(),
            content: content.to_string(),
            title: None,
        }
    }

    async fn source() -> InMemoryVectorSource {
        let source = InMemoryVectorSource::new(Arc::new(MockEmbeddingProvider::new(64)));
        source
            .add_documents(vec![
                doc("lora", "lora lora lora"),
                doc("rust", "borrow checker ownership"),
                doc("mixed", "lora ownership"),
            ])
            .await
            .unwrap();
        source
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let source = source().await;

        let hits = source.search(&SourceQuery::text("lora", 3)).await.unwrap();

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].source_id(), "lora");
        assert!((hits[0].score() - 1.0).abs() < 1e-5);
        assert!(hits.windows(2).all(|w| w[0].score() >= w[1].score()));
        assert_eq!(hits[1].rank(), 1);
        assert!(hits.iter().all(|h| h.origin() == EvidenceOrigin::Vector));
    }

    #[tokio::test]
    async fn test_search_respects_limit_and_embedding() {
        let source = source().await;
        let embedding = MockEmbeddingProvider::new(64).vector_for("borrow checker ownership");

        let hits = source
            .search(&SourceQuery::text("ignored", 1).with_embedding(embedding))
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_id(), "rust");
    }

    #[tokio::test]
    async fn test_re_adding_replaces_document() {
        let source = source().await;
        source.add_documents(vec![doc("lora", "updated")]).await.unwrap();

        assert_eq!(source.len().await, 3);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_error() {
        let source = InMemoryVectorSource::new(Arc::new(
            MockEmbeddingProvider::new(8).with_error("offline"),
        ));

        let err = source.search(&SourceQuery::text("x", 3)).await.unwrap_err();
        assert!(err.is_embedding());
    }
}
