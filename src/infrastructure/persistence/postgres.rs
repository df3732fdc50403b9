//! PostgreSQL repositories
//!
//! Both tables are keyed by request id and written with
//! `ON CONFLICT (request_id) DO NOTHING`, so a replayed request is stored once.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::domain::interaction::{
    ConversationRepository, ConversationTurn, InteractionRecord, InteractionRepository, RequestId,
};
use crate::domain::DomainError;

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

pub async fn connect_pool(config: &PostgresConfig) -> Result<PgPool, DomainError> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn to_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

#[derive(Debug, Clone)]
pub struct PostgresInteractionRepository {
    pool: PgPool,
}

impl PostgresInteractionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn from_row(row: &PgRow) -> Result<InteractionRecord, sqlx::Error> {
        Ok(InteractionRecord {
            request_id: RequestId::new(row.try_get::<String, _>("request_id")?),
            user_id: row.try_get("user_id")?,
            session_id: row.try_get("session_id")?,
            prompt: row.try_get("prompt")?,
            response: row.try_get("response")?,
            model: row.try_get("model")?,
            prompt_tokens: to_u32(row.try_get("prompt_tokens")?),
            completion_tokens: to_u32(row.try_get("completion_tokens")?),
            total_tokens: to_u32(row.try_get("total_tokens")?),
            latency_ms: u64::try_from(row.try_get::<i64, _>("latency_ms")?).unwrap_or(0),
            attempts: to_u32(row.try_get("attempts")?),
            degraded: row.try_get("degraded")?,
            faithfulness_score: row.try_get("faithfulness_score")?,
            error_kind: row.try_get("error_kind")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}

#[async_trait]
impl InteractionRepository for PostgresInteractionRepository {
    async fn insert_once(&self, record: InteractionRecord) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO interactions (
                request_id, user_id, session_id, prompt, response, model,
                prompt_tokens, completion_tokens, total_tokens, latency_ms,
                attempts, degraded, faithfulness_score, error_kind,
                started_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (request_id) DO NOTHING
            "#,
        )
        .bind(record.request_id.as_str())
        .bind(&record.user_id)
        .bind(&record.session_id)
        .bind(&record.prompt)
        .bind(&record.response)
        .bind(&record.model)
        .bind(to_i32(record.prompt_tokens))
        .bind(to_i32(record.completion_tokens))
        .bind(to_i32(record.total_tokens))
        .bind(i64::try_from(record.latency_ms).unwrap_or(i64::MAX))
        .bind(to_i32(record.attempts))
        .bind(record.degraded)
        .bind(record.faithfulness_score)
        .bind(&record.error_kind)
        .bind(record.started_at)
        .bind(record.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to insert interaction: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_request_id(
        &self,
        request_id: &str,
    ) -> Result<Option<InteractionRecord>, DomainError> {
        let row = sqlx::query("SELECT * FROM interactions WHERE request_id = $1")
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to load interaction: {}", e)))?;

        row.as_ref()
            .map(Self::from_row)
            .transpose()
            .map_err(|e| DomainError::storage(format!("Failed to decode interaction: {}", e)))
    }
}

#[derive(Debug, Clone)]
pub struct PostgresConversationRepository {
    pool: PgPool,
}

impl PostgresConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn from_row(row: &PgRow) -> Result<ConversationTurn, sqlx::Error> {
        Ok(ConversationTurn {
            request_id: RequestId::new(row.try_get::<String, _>("request_id")?),
            user_id: row.try_get("user_id")?,
            session_id: row.try_get("session_id")?,
            question: row.try_get("question")?,
            answer: row.try_get("answer")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl ConversationRepository for PostgresConversationRepository {
    async fn insert_once(&self, turn: ConversationTurn) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO conversation_turns
                (request_id, user_id, session_id, question, answer, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (request_id) DO NOTHING
            "#,
        )
        .bind(turn.request_id.as_str())
        .bind(&turn.user_id)
        .bind(&turn.session_id)
        .bind(&turn.question)
        .bind(&turn.answer)
        .bind(turn.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to insert conversation turn: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn recent_turns(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT request_id, user_id, session_id, question, answer, created_at
            FROM conversation_turns
            WHERE user_id = $1 AND session_id = $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(session_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to load conversation: {}", e)))?;

        let mut turns = rows
            .iter()
            .map(Self::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::storage(format!("Failed to decode conversation: {}", e)))?;

        turns.reverse();
        Ok(turns)
    }
}
