//! RAG Query Engine
//!
//! Answers questions from retrieved evidence through a self-correcting
//! workflow:
//! - query preprocessing (rewrite, expansion, hypothetical answer)
//! - concurrent fusion of vector, graph and web retrieval
//! - grounded synthesis graded for faithfulness, with bounded retries
//! - citations, follow-up questions and output format detection

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use crate::config::AppConfig;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::PgPool;
use tracing::{info, warn};

use api::state::AppState;
use crate::config::{StorageBackend, VectorBackend};
use domain::embedding::EmbeddingProvider;
use domain::interaction::{ConversationRepository, InteractionRepository};
use domain::llm::LlmProvider;
use domain::retrieval::RetrievalSource;
use infrastructure::{
    embedding::OpenAiEmbeddingProvider,
    fusion::RetrievalFusionEngine,
    llm::{HttpClient, OpenAiProvider},
    orchestrator::{QueryWorkflowOrchestrator, WorkflowStages},
    persistence::{
        connect_pool, run_migrations, InMemoryConversationRepository,
        InMemoryInteractionRepository, PostgresConfig, PostgresConversationRepository,
        PostgresInteractionRepository,
    },
    preprocess::{LlmGreetingDetector, LlmQueryPreprocessor},
    retrieval::{HttpGraphSource, InMemoryVectorSource, LlmReranker, PgVectorSource, TavilyWebSource},
    services::QueryService,
    synthesis::{
        LlmAnswerSynthesizer, LlmFaithfulnessGrader, LlmFollowUpGenerator,
        LlmOutputFormatDetector, OutputComposer,
    },
};

/// Create application state from configuration
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let service = build_query_service(config).await?;
    Ok(AppState::new(Arc::new(service)))
}

/// Wire every stage of the query workflow from configuration.
///
/// Fails on invalid query settings, on an enabled collaborator without its
/// endpoint, and on storage that cannot be reached or migrated.
pub async fn build_query_service(config: &AppConfig) -> anyhow::Result<QueryService> {
    let workflow_config = config.query.validate()?;
    let models = &config.models;

    let http = HttpClient::with_timeout(Duration::from_secs(models.http_timeout_secs))?;
    let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::with_base_url(
        http.clone(),
        &models.api_key,
        &models.base_url,
    ));
    let embeddings: Arc<dyn EmbeddingProvider> = Arc::new(
        OpenAiEmbeddingProvider::with_base_url(http.clone(), &models.api_key, &models.base_url)
            .with_default_model(&models.embedding_model),
    );
    info!(
        base_url = %models.base_url,
        chat_model = %models.chat_model,
        grading_model = %models.grading_model(),
        embedding_model = %models.embedding_model,
        "Model endpoint configured"
    );

    let needs_pool = config.storage.backend == StorageBackend::Postgres
        || config.retrieval.vector_backend == VectorBackend::Pgvector;
    let pool = if needs_pool {
        Some(create_pool(config).await?)
    } else {
        None
    };

    let vector = build_vector_source(config, pool.as_ref(), embeddings.clone()).await?;
    let mut fusion = RetrievalFusionEngine::new(vector, workflow_config.fusion_options());

    if workflow_config.graph_search_enabled {
        let url = config
            .retrieval
            .graph_search_url
            .as_deref()
            .context("query.graph_search_enabled requires retrieval.graph_search_url")?;
        info!(url = %url, "Graph search enabled");
        fusion = fusion.with_graph(Arc::new(HttpGraphSource::new(http.clone(), url)));
    }

    if workflow_config.web_search_enabled {
        let api_key = config
            .retrieval
            .web_search_api_key
            .as_deref()
            .context("query.web_search_enabled requires retrieval.web_search_api_key")?;
        let max_results = config.retrieval.max_web_results;
        let source = match config.retrieval.web_search_url.as_deref() {
            Some(url) => TavilyWebSource::with_url(http.clone(), url, api_key, max_results),
            None => TavilyWebSource::new(http.clone(), api_key, max_results),
        };
        info!(max_results, "Web search enabled");
        fusion = fusion.with_web(Arc::new(source));
    }

    if workflow_config.rerank_enabled {
        fusion = fusion.with_reranker(Arc::new(LlmReranker::new(
            llm.clone(),
            models.grading_model(),
        )));
    }

    let composer = OutputComposer::new(workflow_config.compose_options())
        .with_follow_ups(Arc::new(LlmFollowUpGenerator::new(
            llm.clone(),
            &models.chat_model,
        )))
        .with_format_detector(Arc::new(LlmOutputFormatDetector::new(
            llm.clone(),
            &models.chat_model,
        )));

    let stages = WorkflowStages {
        preprocessor: Arc::new(LlmQueryPreprocessor::new(
            llm.clone(),
            embeddings.clone(),
            &models.chat_model,
            workflow_config.preprocess_options(),
        )),
        fusion: Arc::new(fusion),
        synthesizer: Arc::new(LlmAnswerSynthesizer::new(
            llm.clone(),
            &models.chat_model,
            models.temperature,
        )),
        grader: Arc::new(LlmFaithfulnessGrader::new(llm.clone(), models.grading_model())),
        composer: Arc::new(composer),
    };
    let orchestrator = QueryWorkflowOrchestrator::new(&workflow_config, stages);

    let (interactions, conversations) = build_repositories(config, pool).await?;

    info!(
        max_retries = workflow_config.max_retries,
        minimum_score = workflow_config.minimum_score,
        top_k = workflow_config.top_k,
        greeting_detection = workflow_config.greeting_detection_enabled,
        "Query workflow ready"
    );

    let service = QueryService::new(
        Arc::new(orchestrator),
        interactions,
        conversations,
        workflow_config.history_turns,
    );
    if workflow_config.greeting_detection_enabled {
        return Ok(service.with_greeting_detector(Arc::new(LlmGreetingDetector::new(
            llm,
            &models.chat_model,
        ))));
    }
    Ok(service)
}

async fn create_pool(config: &AppConfig) -> anyhow::Result<PgPool> {
    let url = config
        .storage
        .database_url
        .as_deref()
        .context("storage.database_url is required for the postgres and pgvector backends")?;
    let pool_config = PostgresConfig::new(url).with_max_connections(config.storage.max_connections);

    info!("Connecting to PostgreSQL");
    Ok(connect_pool(&pool_config).await?)
}

async fn build_vector_source(
    config: &AppConfig,
    pool: Option<&PgPool>,
    embeddings: Arc<dyn EmbeddingProvider>,
) -> anyhow::Result<Arc<dyn RetrievalSource>> {
    match (config.retrieval.vector_backend, pool) {
        (VectorBackend::Pgvector, Some(pool)) => {
            info!(table = %config.retrieval.vector_table, "Using pgvector retrieval");
            Ok(Arc::new(PgVectorSource::new(
                pool.clone(),
                &config.retrieval.vector_table,
                embeddings,
            )?))
        }
        (VectorBackend::Pgvector, None) => {
            anyhow::bail!("pgvector backend selected without a database connection")
        }
        (VectorBackend::InMemory, _) => {
            let source = InMemoryVectorSource::new(embeddings);
            match config.retrieval.corpus_path.as_deref() {
                Some(path) => {
                    let indexed = source.load_corpus_file(Path::new(path)).await?;
                    info!(path = %path, documents = indexed, "In-memory corpus indexed");
                }
                None => warn!("In-memory vector backend has no corpus_path, index is empty"),
            }
            Ok(Arc::new(source))
        }
    }
}

async fn build_repositories(
    config: &AppConfig,
    pool: Option<PgPool>,
) -> anyhow::Result<(Arc<dyn InteractionRepository>, Arc<dyn ConversationRepository>)> {
    match (config.storage.backend, pool) {
        (StorageBackend::Postgres, Some(pool)) => {
            run_migrations(&pool).await?;
            info!("Using PostgreSQL interaction storage");
            Ok((
                Arc::new(PostgresInteractionRepository::new(pool.clone())),
                Arc::new(PostgresConversationRepository::new(pool)),
            ))
        }
        (StorageBackend::Postgres, None) => {
            anyhow::bail!("postgres storage selected without a database connection")
        }
        (StorageBackend::InMemory, _) => {
            info!("Using in-memory interaction storage");
            Ok((
                Arc::new(InMemoryInteractionRepository::new()),
                Arc::new(InMemoryConversationRepository::new()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_service_builds_without_network() {
        let config = AppConfig::default();
        assert!(build_query_service(&config).await.is_ok());
    }

    #[tokio::test]
    async fn test_greeting_detection_wired_when_enabled() {
        let mut config = AppConfig::default();
        config.query.greeting_detection_enabled = true;

        let service = build_query_service(&config).await.unwrap();
        assert!(format!("{:?}", service).contains("LlmGreetingDetector"));
    }

    #[tokio::test]
    async fn test_invalid_query_settings_abort_startup() {
        let mut config = AppConfig::default();
        config.query.minimum_score = 1.5;

        let err = build_query_service(&config).await.unwrap_err();
        assert!(err.to_string().contains("minimum_score"));
    }

    #[tokio::test]
    async fn test_web_search_requires_api_key() {
        let mut config = AppConfig::default();
        config.query.web_search_enabled = true;

        let err = build_query_service(&config).await.unwrap_err();
        assert!(err.to_string().contains("web_search_api_key"));
    }

    #[tokio::test]
    async fn test_postgres_requires_database_url() {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Postgres;

        let err = build_query_service(&config).await.unwrap_err();
        assert!(err.to_string().contains("database_url"));
    }
}
