//! Embedding provider trait definition

use async_trait::async_trait;
use std::fmt::Debug;

use super::{EmbeddingRequest, EmbeddingResponse};
use crate::domain::DomainError;

/// Trait for embedding providers
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + Debug {
    /// Generate embeddings for the given input
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, DomainError>;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;

    /// Model used when the caller does not pick one
    fn default_model(&self) -> &str;
}

/// Embed one text with the provider's default model
pub async fn embed_text(
    provider: &dyn EmbeddingProvider,
    text: &str,
) -> Result<Vec<f32>, DomainError> {
    let request = EmbeddingRequest::single(provider.default_model(), text);
    provider
        .embed(request)
        .await?
        .into_vectors()
        .into_iter()
        .next()
        .ok_or_else(|| DomainError::embedding("Provider returned no embedding"))
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::domain::embedding::Embedding;

    /// Deterministic bag-of-characters embedder.
    ///
    /// Texts sharing characters land close together, which is enough to make
    /// similarity ordering predictable in tests.
    #[derive(Debug)]
    pub struct MockEmbeddingProvider {
        dimensions: usize,
        error: Option<String>,
    }

    impl MockEmbeddingProvider {
        pub fn new(dimensions: usize) -> Self {
            Self {
                dimensions,
                error: None,
            }
        }

        pub fn with_error(mut self, error: impl Into<String>) -> Self {
            self.error = Some(error.into());
            self
        }

        pub fn vector_for(&self, text: &str) -> Vec<f32> {
            let mut vector = vec![0.0; self.dimensions];
            for byte in text.to_lowercase().bytes().filter(|b| b.is_ascii_alphanumeric()) {
                vector[byte as usize % self.dimensions] += 1.0;
            }
            vector
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbeddingProvider {
        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, DomainError> {
            if let Some(ref error) = self.error {
                return Err(DomainError::embedding(error.clone()));
            }

            let embeddings = request
                .inputs()
                .iter()
                .enumerate()
                .map(|(idx, text)| Embedding::new(idx, self.vector_for(text)))
                .collect();

            let tokens = request.inputs().iter().map(|t| t.len() / 4).sum::<usize>() as u32;

            Ok(EmbeddingResponse::new(
                request.model().to_string(),
                embeddings,
                tokens,
            ))
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }

        fn default_model(&self) -> &str {
            "mock-embedding"
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_batch_is_deterministic() {
            let provider = MockEmbeddingProvider::new(32);
            let request = EmbeddingRequest::batch("m", vec!["lora".into(), "lora".into()]);

            let response = provider.embed(request).await.unwrap();
            let vectors = response.into_vectors();

            assert_eq!(vectors.len(), 2);
            assert_eq!(vectors[0].len(), 32);
            assert_eq!(vectors[0], vectors[1]);
        }

        #[tokio::test]
        async fn test_embed_text_uses_default_model() {
            let provider = MockEmbeddingProvider::new(16);
            let vector = embed_text(&provider, "What is LORA?").await.unwrap();

            assert_eq!(vector, provider.vector_for("What is LORA?"));
        }

        #[tokio::test]
        async fn test_mock_error_is_embedding_error() {
            let provider = MockEmbeddingProvider::new(8).with_error("model offline");
            let result = provider.embed(EmbeddingRequest::single("m", "x")).await;

            assert!(result.unwrap_err().is_embedding());
        }
    }
}
