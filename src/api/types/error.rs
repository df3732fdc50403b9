//! API error body and status mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::query_workflow::WorkflowError;

/// Coarse error class reported in the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorType {
    InvalidRequestError,
    ServerError,
    ServiceUnavailableError,
    TimeoutError,
}

impl std::fmt::Display for ApiErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequestError => write!(f, "invalid_request_error"),
            Self::ServerError => write!(f, "server_error"),
            Self::ServiceUnavailableError => write!(f, "service_unavailable_error"),
            Self::TimeoutError => write!(f, "timeout_error"),
        }
    }
}

/// `{ "error": { ... } }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: ApiErrorType,
    /// Stable error kind, e.g. `retrieval_unavailable`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// API error with status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ApiErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, error_type: ApiErrorType, message: impl Into<String>) -> Self {
        Self {
            status,
            response: ApiErrorResponse {
                error: ApiErrorDetail {
                    message: message.into(),
                    error_type,
                    code: None,
                },
            },
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.response.error.code = Some(code.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ApiErrorType::InvalidRequestError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ApiErrorType::ServerError, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorType::ServiceUnavailableError,
            message,
        )
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, ApiErrorType::TimeoutError, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        let message = err.to_string();
        let base = match &err {
            WorkflowError::InvalidRequest { .. } => Self::bad_request(message),
            WorkflowError::RetrievalUnavailable { .. } | WorkflowError::SynthesisFailure { .. } => {
                Self::unavailable(message)
            }
            WorkflowError::RequestTimeout { .. } => Self::timeout(message),
            _ => Self::internal(message),
        };

        base.with_code(err.kind())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.response.error.error_type, self.response.error.message
        )
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (WorkflowError::invalid_request("empty"), StatusCode::BAD_REQUEST),
            (WorkflowError::retrieval_unavailable("down"), StatusCode::SERVICE_UNAVAILABLE),
            (WorkflowError::synthesis_failure("boom"), StatusCode::SERVICE_UNAVAILABLE),
            (WorkflowError::request_timeout(100), StatusCode::GATEWAY_TIMEOUT),
            (WorkflowError::embedding_failure("x"), StatusCode::INTERNAL_SERVER_ERROR),
            (WorkflowError::internal("bad"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            let kind = err.kind();
            let api: ApiError = err.into();
            assert_eq!(api.status, status, "{}", kind);
            assert_eq!(api.response.error.code.as_deref(), Some(kind));
        }
    }

    #[test]
    fn test_error_body_shape() {
        let api: ApiError = WorkflowError::retrieval_unavailable("all sources failed").into();
        let json = serde_json::to_value(&api.response).unwrap();

        assert_eq!(json["error"]["type"], "service_unavailable_error");
        assert_eq!(json["error"]["code"], "retrieval_unavailable");
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("all sources failed"));
    }

    #[test]
    fn test_error_type_display() {
        assert_eq!(ApiErrorType::TimeoutError.to_string(), "timeout_error");
        assert_eq!(
            ApiErrorType::InvalidRequestError.to_string(),
            "invalid_request_error"
        );
    }
}
