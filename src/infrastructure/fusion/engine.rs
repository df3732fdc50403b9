//! Retrieval Fusion Engine
//!
//! Fans a [`Query`] out to every enabled source, tolerates partial failure and
//! merges the hit lists into one ranked [`FusedResult`].

use std::sync::Arc;

use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::domain::query_workflow::{FusionOptions, Query, WorkflowError};
use crate::domain::retrieval::{
    merge_candidates, EvidenceChunk, FusedResult, Reranker, RetrievalSource, SourceQuery,
};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_retrieval_source;

/// Evidence from one retrieval pass plus the sources that failed during it
#[derive(Debug, Clone)]
pub struct FusionOutcome {
    pub result: FusedResult,
    /// Per-source failures that were tolerated
    pub source_failures: Vec<WorkflowError>,
}

/// Why one source produced nothing
#[derive(Debug)]
struct SourceFailure {
    error: WorkflowError,
    embedding_only: bool,
}

#[derive(Debug)]
pub struct RetrievalFusionEngine {
    vector: Arc<dyn RetrievalSource>,
    graph: Option<Arc<dyn RetrievalSource>>,
    web: Option<Arc<dyn RetrievalSource>>,
    reranker: Option<Arc<dyn Reranker>>,
    options: FusionOptions,
}

impl RetrievalFusionEngine {
    pub fn new(vector: Arc<dyn RetrievalSource>, options: FusionOptions) -> Self {
        Self {
            vector,
            graph: None,
            web: None,
            reranker: None,
            options,
        }
    }

    pub fn with_graph(mut self, source: Arc<dyn RetrievalSource>) -> Self {
        self.graph = Some(source);
        self
    }

    pub fn with_web(mut self, source: Arc<dyn RetrievalSource>) -> Self {
        self.web = Some(source);
        self
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Sources taking part in this pass, in merge order
    fn active_sources(&self) -> Vec<Arc<dyn RetrievalSource>> {
        let mut sources = vec![self.vector.clone()];

        if self.options.graph_search_enabled {
            if let Some(ref graph) = self.graph {
                sources.push(graph.clone());
            }
        }

        if self.options.web_search_enabled {
            if let Some(ref web) = self.web {
                sources.push(web.clone());
            }
        }

        sources.sort_by_key(|s| s.origin().merge_priority());
        sources
    }

    fn candidate_limit(&self) -> usize {
        if self.rerank_active() {
            self.options.top_k * 2
        } else {
            self.options.top_k
        }
    }

    fn rerank_active(&self) -> bool {
        self.options.rerank_enabled && self.reranker.is_some()
    }

    /// Search every active source and fuse the results.
    ///
    /// Fails only when every source failed. A run where every failure came
    /// from embedding the query reports `embedding_failure`.
    pub async fn retrieve(&self, query: &Query) -> Result<FusionOutcome, WorkflowError> {
        let sources = self.active_sources();
        let limit = self.candidate_limit();

        let outcomes = join_all(
            sources
                .iter()
                .map(|source| self.search_source(source.as_ref(), query, limit)),
        )
        .await;

        let mut batches = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();

        for (source, outcome) in sources.iter().zip(outcomes) {
            match outcome {
                Ok(hits) => {
                    record_retrieval_source(source.source_name(), true);
                    debug!(source = %source.source_name(), hits = hits.len(), "Source returned");
                    batches.push(hits);
                }
                Err(failure) => {
                    record_retrieval_source(source.source_name(), false);
                    warn!(
                        source = %source.source_name(),
                        error = %failure.error,
                        "Retrieval source failed, continuing with remaining sources"
                    );
                    failures.push(failure);
                }
            }
        }

        if batches.is_empty() {
            return Err(all_sources_failed(failures));
        }

        let mut candidates = merge_candidates(batches);

        if self.rerank_active() && !candidates.is_empty() {
            candidates = self.rerank(query.primary_text(), candidates).await;
        }

        let result = FusedResult::from_ranked(candidates, self.options.top_k);

        info!(
            evidence = result.len(),
            failed_sources = failures.len(),
            "Retrieval fused"
        );

        Ok(FusionOutcome {
            result,
            source_failures: failures.into_iter().map(|f| f.error).collect(),
        })
    }

    /// Run every query variant against one source.
    ///
    /// The source counts as failed only when all of its calls failed.
    async fn search_source(
        &self,
        source: &dyn RetrievalSource,
        query: &Query,
        limit: usize,
    ) -> Result<Vec<EvidenceChunk>, SourceFailure> {
        let mut requests: Vec<SourceQuery> = query
            .search_texts()
            .into_iter()
            .take(source.max_query_variants().max(1))
            .map(|text| SourceQuery::text(text, limit))
            .collect();

        if source.accepts_embeddings() {
            if let Some(embedding) = query.hypothetical_embedding() {
                requests.push(
                    SourceQuery::text(query.primary_text(), limit)
                        .with_embedding(embedding.to_vec()),
                );
            }
        }

        let source_timeout = self.options.source_timeout;
        let calls = requests.iter().map(|request| async move {
            match timeout(source_timeout, source.search(request)).await {
                Ok(result) => result,
                Err(_) => Err(DomainError::retrieval(
                    source.source_name(),
                    format!("timed out after {}ms", source_timeout.as_millis()),
                )),
            }
        });

        let mut hits = Vec::new();
        let mut errors = Vec::new();

        for result in join_all(calls).await {
            match result {
                Ok(chunks) => hits.push(chunks),
                Err(e) => errors.push(e),
            }
        }

        if hits.is_empty() {
            return Err(source_failure(source.source_name(), errors));
        }

        if !errors.is_empty() {
            debug!(
                source = %source.source_name(),
                failed_calls = errors.len(),
                "Some query variants failed"
            );
        }

        Ok(merge_candidates(hits))
    }

    async fn rerank(&self, query: &str, candidates: Vec<EvidenceChunk>) -> Vec<EvidenceChunk> {
        let Some(ref reranker) = self.reranker else {
            return candidates;
        };

        match reranker.rerank(query, candidates.clone()).await {
            Ok(mut rescored) => {
                rescored.sort_by(|a, b| {
                    b.score()
                        .total_cmp(&a.score())
                        .then_with(|| a.rank().cmp(&b.rank()))
                });
                rescored
            }
            Err(e) => {
                warn!(
                    reranker = reranker.reranker_name(),
                    error = %e,
                    "Rerank failed, keeping retrieval order"
                );
                candidates
            }
        }
    }
}

fn source_failure(source_name: &str, errors: Vec<DomainError>) -> SourceFailure {
    let embedding_only = !errors.is_empty() && errors.iter().all(DomainError::is_embedding);
    let message = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");

    let error = if embedding_only {
        WorkflowError::embedding_failure(message)
    } else {
        WorkflowError::retrieval_source_unavailable(source_name, message)
    };

    SourceFailure {
        error,
        embedding_only,
    }
}

fn all_sources_failed(failures: Vec<SourceFailure>) -> WorkflowError {
    let embedding_only = !failures.is_empty() && failures.iter().all(|f| f.embedding_only);
    let message = failures
        .iter()
        .map(|f| f.error.to_string())
        .collect::<Vec<_>>()
        .join("; ");

    if embedding_only {
        WorkflowError::embedding_failure(message)
    } else {
        WorkflowError::retrieval_unavailable(message)
    }
}
