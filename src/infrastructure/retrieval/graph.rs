//! Knowledge-graph search over HTTP

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::retrieval::{EvidenceChunk, EvidenceOrigin, RetrievalSource, SourceQuery};
use crate::domain::DomainError;
use crate::infrastructure::llm::HttpClientTrait;

/// Graph search service speaking `POST {query, limit}` -> `{results: [...]}`
#[derive(Debug)]
pub struct HttpGraphSource<C: HttpClientTrait> {
    client: C,
    url: String,
}

impl<C: HttpClientTrait> HttpGraphSource<C> {
    pub fn new(client: C, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphSearchResponse {
    #[serde(default)]
    results: Vec<GraphHit>,
}

#[derive(Debug, Deserialize)]
struct GraphHit {
    id: String,
    content: String,
    score: f32,
    #[serde(default)]
    title: Option<String>,
}

#[async_trait]
impl<C: HttpClientTrait> RetrievalSource for HttpGraphSource<C> {
    async fn search(&self, query: &SourceQuery) -> Result<Vec<EvidenceChunk>, DomainError> {
        let body = serde_json::json!({
            "query": query.text,
            "limit": query.limit,
        });

        let json = self
            .client
            .post_json(&self.url, vec![("Content-Type", "application/json")], &body)
            .await
            .map_err(|e| DomainError::retrieval("graph", e.to_string()))?;

        let response: GraphSearchResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::retrieval("graph", format!("Invalid graph search response: {}", e))
        })?;

        Ok(response
            .results
            .into_iter()
            .take(query.limit)
            .enumerate()
            .map(|(rank, hit)| {
                let chunk = EvidenceChunk::new(
                    hit.id,
                    hit.content,
                    EvidenceOrigin::Graph,
                    hit.score.clamp(0.0, 1.0),
                )
                .with_rank(rank);
                match hit.title {
                    Some(title) => chunk.with_title(title),
                    None => chunk,
                }
            })
            .collect())
    }

    fn origin(&self) -> EvidenceOrigin {
        EvidenceOrigin::Graph
    }

    fn source_name(&self) -> &str {
        "graph"
    }
}
