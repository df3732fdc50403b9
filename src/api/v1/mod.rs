//! Versioned query API

pub mod query;

use axum::{routing::post, Router};

use super::state::AppState;

pub fn create_v1_router() -> Router<AppState> {
    Router::new().route("/query", post(query::answer_query))
}
