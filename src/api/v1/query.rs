//! POST /v1/query

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
};
use tracing::{info, warn};

use crate::api::middleware::REQUEST_ID_HEADER;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, QueryBody, QueryResponse};
use crate::infrastructure::services::QueryRequest;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Answer a question. Degraded answers are still `200` with `degraded: true`.
pub async fn answer_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<QueryBody>,
) -> Result<(StatusCode, Json<QueryResponse>), ApiError> {
    let mut request = QueryRequest::from(body);
    apply_identity_headers(&mut request, &headers);

    match state.query_service.answer(request).await {
        Ok(outcome) => {
            info!(
                request_id = %outcome.request_id,
                degraded = outcome.result.degraded,
                attempts = outcome.result.attempts,
                "Query answered"
            );
            Ok((StatusCode::OK, Json(QueryResponse::from(outcome))))
        }
        Err(e) => {
            warn!(kind = e.kind(), error = %e, "Query failed");
            Err(ApiError::from(e))
        }
    }
}

fn apply_identity_headers(request: &mut QueryRequest, headers: &HeaderMap) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    if let Some(request_id) = header(REQUEST_ID_HEADER) {
        request.request_id = Some(request_id);
    }
    if let Some(user_id) = header(USER_ID_HEADER) {
        request.user_id = Some(user_id);
    }
    if let Some(session_id) = header(SESSION_ID_HEADER) {
        request.session_id = Some(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_override_body_identity() {
        let mut request = QueryRequest::new("q").with_session("body-user", "body-session");
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, "header-user".parse().unwrap());
        headers.insert(REQUEST_ID_HEADER, "req-1".parse().unwrap());
        headers.insert(SESSION_ID_HEADER, "  ".parse().unwrap());

        apply_identity_headers(&mut request, &headers);

        assert_eq!(request.user_id.as_deref(), Some("header-user"));
        assert_eq!(request.request_id.as_deref(), Some("req-1"));
        assert_eq!(request.session_id.as_deref(), Some("body-session"));
    }
}
