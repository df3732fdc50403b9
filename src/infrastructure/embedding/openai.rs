//! OpenAI-compatible embedding provider

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::embedding::{Embedding, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
use crate::domain::DomainError;
use crate::infrastructure::llm::HttpClientTrait;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Embedding provider for OpenAI's `/v1/embeddings` contract
#[derive(Debug)]
pub struct OpenAiEmbeddingProvider<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
    default_model: String,
}

impl<C: HttpClientTrait> OpenAiEmbeddingProvider<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_OPENAI_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            auth_header: format!("Bearer {}", api_key.into()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn build_request(&self, request: &EmbeddingRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model(),
            "input": request.inputs(),
        });

        if let Some(dims) = request.dimensions() {
            body["dimensions"] = serde_json::json!(dims);
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<EmbeddingResponse, DomainError> {
        let response: OpenAiEmbeddingResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::embedding(format!("Failed to parse embedding response: {}", e))
        })?;

        let embeddings: Vec<Embedding> = response
            .data
            .into_iter()
            .map(|d| Embedding::new(d.index, d.embedding))
            .collect();

        let total_tokens = response.usage.map(|u| u.total_tokens).unwrap_or(0);

        Ok(EmbeddingResponse::new(response.model, embeddings, total_tokens))
    }
}

#[async_trait]
impl<C: HttpClientTrait> EmbeddingProvider for OpenAiEmbeddingProvider<C> {
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, DomainError> {
        if request.inputs().is_empty() {
            return Err(DomainError::embedding("No input texts to embed"));
        }

        let url = self.embeddings_url();
        let body = self.build_request(&request);

        let response = self
            .client
            .post_json(&url, self.headers(), &body)
            .await
            .map_err(|e| DomainError::embedding(e.to_string()))?;

        let parsed = self.parse_response(response)?;
        if parsed.embeddings().len() != request.inputs().len() {
            return Err(DomainError::embedding(format!(
                "Expected {} embeddings, received {}",
                request.inputs().len(),
                parsed.embeddings().len()
            )));
        }

        Ok(parsed)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    model: String,
    data: Vec<OpenAiEmbeddingData>,
    usage: Option<OpenAiEmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingUsage {
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::llm::MockHttpClient;

    const TEST_URL: &str = "https://api.openai.com/v1/embeddings";

    fn mock_response(count: usize, dimensions: usize) -> serde_json::Value {
        let data: Vec<serde_json::Value> = (0..count)
            .rev()
            .map(|i| {
                let embedding: Vec<f32> = (0..dimensions).map(|j| (i + j) as f32 * 0.25).collect();
                serde_json::json!({ "index": i, "embedding": embedding, "object": "embedding" })
            })
            .collect();

        serde_json::json!({
            "model": "text-embedding-3-small",
            "data": data,
            "usage": { "prompt_tokens": 10, "total_tokens": 10 }
        })
    }

    #[tokio::test]
    async fn test_embed_batch_in_request_order() {
        let client = MockHttpClient::new().with_response(TEST_URL, mock_response(2, 4));
        let provider = OpenAiEmbeddingProvider::new(client, "test-api-key");

        let request = EmbeddingRequest::batch("text-embedding-3-small", vec!["a".into(), "b".into()]);
        let response = provider.embed(request).await.unwrap();

        assert_eq!(response.total_tokens(), 10);
        let vectors = response.into_vectors();
        assert_eq!(vectors[0], vec![0.0, 0.25, 0.5, 0.75]);
        assert_eq!(vectors[1][0], 0.25);
    }

    #[tokio::test]
    async fn test_request_body() {
        let client = MockHttpClient::new().with_response(TEST_URL, mock_response(1, 2));
        let provider = OpenAiEmbeddingProvider::new(client, "key");

        provider
            .embed(EmbeddingRequest::single("text-embedding-3-small", "What is LORA?").with_dimensions(2))
            .await
            .unwrap();

        let (_, body) = provider.client.sent_bodies().pop().unwrap();
        assert_eq!(body["input"], serde_json::json!(["What is LORA?"]));
        assert_eq!(body["dimensions"], 2);
    }

    #[tokio::test]
    async fn test_http_error_becomes_embedding_error() {
        let client = MockHttpClient::new().with_error(TEST_URL, "rate limited");
        let provider = OpenAiEmbeddingProvider::new(client, "key");

        let err = provider
            .embed(EmbeddingRequest::single("m", "x"))
            .await
            .unwrap_err();

        assert!(err.is_embedding());
    }

    #[tokio::test]
    async fn test_count_mismatch_is_error() {
        let client = MockHttpClient::new().with_response(TEST_URL, mock_response(1, 2));
        let provider = OpenAiEmbeddingProvider::new(client, "key");

        let err = provider
            .embed(EmbeddingRequest::batch("m", vec!["a".into(), "b".into()]))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Expected 2 embeddings"));
    }

    #[test]
    fn test_default_model_override() {
        let provider = OpenAiEmbeddingProvider::new(MockHttpClient::new(), "key")
            .with_default_model("nomic-embed-text");

        assert_eq!(provider.default_model(), "nomic-embed-text");
    }
}
