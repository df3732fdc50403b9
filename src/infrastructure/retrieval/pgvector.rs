//! pgvector-backed vector similarity source

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::fmt::Debug;
use std::sync::Arc;

use super::cosine_distance_to_similarity;
use crate::domain::embedding::{embed_text, EmbeddingProvider};
use crate::domain::retrieval::{EvidenceChunk, EvidenceOrigin, RetrievalSource, SourceQuery};
use crate::domain::DomainError;

/// Vector search over a pgvector table with columns
/// `id text, content text, title text null, embedding vector`
pub struct PgVectorSource {
    pool: PgPool,
    table: String,
    embedding_provider: Arc<dyn EmbeddingProvider>,
}

impl Debug for PgVectorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgVectorSource")
            .field("table", &self.table)
            .field("embedding_provider", &self.embedding_provider)
            .finish()
    }
}

impl PgVectorSource {
    pub fn new(
        pool: PgPool,
        table: impl Into<String>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, DomainError> {
        let table = table.into();
        validate_table_name(&table)?;

        Ok(Self {
            pool,
            table,
            embedding_provider,
        })
    }

    async fn query_embedding(&self, query: &SourceQuery) -> Result<Vec<f32>, DomainError> {
        match &query.embedding {
            Some(embedding) => Ok(embedding.clone()),
            None => embed_text(self.embedding_provider.as_ref(), &query.text).await,
        }
    }
}

/// Table names are interpolated into SQL, so only `[A-Za-z0-9_.]` is accepted
fn validate_table_name(table: &str) -> Result<(), DomainError> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');

    if valid {
        Ok(())
    } else {
        Err(DomainError::configuration(format!(
            "Invalid vector table name: {}",
            table
        )))
    }
}

fn column<T>(value: Result<T, sqlx::Error>, name: &str) -> Result<T, DomainError> {
    value.map_err(|e| DomainError::retrieval("vector", format!("Column '{}': {}", name, e)))
}

fn embedding_to_pgvector(embedding: &[f32]) -> String {
    let values: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", values.join(","))
}

#[async_trait]
impl RetrievalSource for PgVectorSource {
    async fn search(&self, query: &SourceQuery) -> Result<Vec<EvidenceChunk>, DomainError> {
        let embedding = self.query_embedding(query).await?;

        let sql = format!(
            r#"
            SELECT id, content, title, embedding <=> $1::vector AS distance
            FROM {}
            ORDER BY distance
            LIMIT $2
            "#,
            self.table
        );

        let rows = sqlx::query(&sql)
            .bind(embedding_to_pgvector(&embedding))
            .bind(query.limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(table = %self.table, error = %e, "Vector search failed");
                DomainError::retrieval("vector", format!("Search failed: {}", e))
            })?;

        let mut chunks = Vec::with_capacity(rows.len());
        for (rank, row) in rows.into_iter().enumerate() {
            let id: String = column(row.try_get("id"), "id")?;
            let content: String = column(row.try_get("content"), "content")?;
            let title: Option<String> = column(row.try_get("title"), "title")?;
            let distance: f64 = column(row.try_get("distance"), "distance")?;

            let mut chunk = EvidenceChunk::new(
                id,
                content,
                EvidenceOrigin::Vector,
                cosine_distance_to_similarity(distance),
            )
            .with_rank(rank);
            if let Some(title) = title {
                chunk = chunk.with_title(title);
            }
            chunks.push(chunk);
        }

        tracing::debug!(
            table = %self.table,
            results = chunks.len(),
            used_hypothetical = query.embedding.is_some(),
            "Vector search completed"
        );

        Ok(chunks)
    }

    fn origin(&self) -> EvidenceOrigin {
        EvidenceOrigin::Vector
    }

    fn source_name(&self) -> &str {
        "pgvector"
    }

    fn accepts_embeddings(&self) -> bool {
        true
    }
}
