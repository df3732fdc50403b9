//! Workflow error taxonomy

use thiserror::Error;

use crate::domain::DomainError;

/// Failures surfaced by the query workflow.
///
/// Every variant maps to a stable `kind()` string used in API responses,
/// logs and metrics labels.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkflowError {
    #[error("Retrieval source '{source_name}' unavailable: {message}")]
    RetrievalSourceUnavailable {
        source_name: String,
        message: String,
    },

    #[error("All retrieval sources failed: {message}")]
    RetrievalUnavailable { message: String },

    #[error("Embedding failure: {message}")]
    EmbeddingFailure { message: String },

    #[error("Answer synthesis failed: {message}")]
    SynthesisFailure { message: String },

    #[error("Faithfulness grading failed: {message}")]
    GradingFailure { message: String },

    #[error("Invalid configuration: {message}")]
    ConfigValidation { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Request timed out after {timeout_ms}ms")]
    RequestTimeout { timeout_ms: u64 },

    #[error("Persistence failure: {message}")]
    PersistenceFailure { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl WorkflowError {
    pub fn retrieval_source_unavailable(
        source_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::RetrievalSourceUnavailable {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn retrieval_unavailable(message: impl Into<String>) -> Self {
        Self::RetrievalUnavailable {
            message: message.into(),
        }
    }

    pub fn embedding_failure(message: impl Into<String>) -> Self {
        Self::EmbeddingFailure {
            message: message.into(),
        }
    }

    pub fn synthesis_failure(message: impl Into<String>) -> Self {
        Self::SynthesisFailure {
            message: message.into(),
        }
    }

    pub fn grading_failure(message: impl Into<String>) -> Self {
        Self::GradingFailure {
            message: message.into(),
        }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn request_timeout(timeout_ms: u64) -> Self {
        Self::RequestTimeout { timeout_ms }
    }

    pub fn persistence_failure(message: impl Into<String>) -> Self {
        Self::PersistenceFailure {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RetrievalSourceUnavailable { .. } => "retrieval_source_unavailable",
            Self::RetrievalUnavailable { .. } => "retrieval_unavailable",
            Self::EmbeddingFailure { .. } => "embedding_failure",
            Self::SynthesisFailure { .. } => "synthesis_failure",
            Self::GradingFailure { .. } => "grading_failure",
            Self::ConfigValidation { .. } => "config_validation_error",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::RequestTimeout { .. } => "request_timeout",
            Self::PersistenceFailure { .. } => "persistence_failure",
            Self::Internal { .. } => "internal_error",
        }
    }
}

impl From<DomainError> for WorkflowError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { message } => Self::InvalidRequest { message },
            DomainError::Embedding { message } => Self::EmbeddingFailure { message },
            DomainError::Retrieval {
                source_name,
                message,
            } => Self::RetrievalSourceUnavailable {
                source_name,
                message,
            },
            DomainError::Configuration { message } => Self::ConfigValidation { message },
            DomainError::Storage { message } => Self::PersistenceFailure { message },
            other => Self::Internal {
                message: other.to_string(),
            },
        }
    }
}
