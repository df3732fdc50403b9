//! Web search through the Tavily API

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::retrieval::{EvidenceChunk, EvidenceOrigin, RetrievalSource, SourceQuery};
use crate::domain::DomainError;
use crate::infrastructure::llm::HttpClientTrait;

const DEFAULT_TAVILY_URL: &str = "https://api.tavily.com/search";
/// Score given to results when the API omits one
const UNSCORED_RESULT: f32 = 0.5;

/// Web search source; the result URL is used as the source identifier
#[derive(Debug)]
pub struct TavilyWebSource<C: HttpClientTrait> {
    client: C,
    url: String,
    api_key: String,
    max_results: usize,
}

impl<C: HttpClientTrait> TavilyWebSource<C> {
    pub fn new(client: C, api_key: impl Into<String>, max_results: usize) -> Self {
        Self::with_url(client, DEFAULT_TAVILY_URL, api_key, max_results)
    }

    pub fn with_url(
        client: C,
        url: impl Into<String>,
        api_key: impl Into<String>,
        max_results: usize,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            max_results,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    #[serde(default)]
    title: Option<String>,
    content: String,
    #[serde(default)]
    score: Option<f32>,
}

#[async_trait]
impl<C: HttpClientTrait> RetrievalSource for TavilyWebSource<C> {
    async fn search(&self, query: &SourceQuery) -> Result<Vec<EvidenceChunk>, DomainError> {
        let limit = query.limit.min(self.max_results);
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query.text,
            "max_results": limit,
            "search_depth": "basic",
        });

        let json = self
            .client
            .post_json(&self.url, vec![("Content-Type", "application/json")], &body)
            .await
            .map_err(|e| DomainError::retrieval("web", e.to_string()))?;

        let response: TavilyResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::retrieval("web", format!("Invalid web search response: {}", e))
        })?;

        if response.results.is_empty() {
            tracing::warn!(query = %query.text, "Web search returned no results");
        }

        Ok(response
            .results
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(rank, result)| {
                let score = result.score.unwrap_or(UNSCORED_RESULT).clamp(0.0, 1.0);
                let chunk = EvidenceChunk::new(result.url, result.content, EvidenceOrigin::Web, score)
                    .with_rank(rank);
                match result.title {
                    Some(title) => chunk.with_title(title),
                    None => chunk,
                }
            })
            .collect())
    }

    fn origin(&self) -> EvidenceOrigin {
        EvidenceOrigin::Web
    }

    fn source_name(&self) -> &str {
        "tavily"
    }

    fn max_query_variants(&self) -> usize {
        1
    }
}
