//! Shared handler state

use std::sync::Arc;

use crate::infrastructure::services::QueryService;

/// Application state handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub query_service: Arc<QueryService>,
}

impl AppState {
    pub fn new(query_service: Arc<QueryService>) -> Self {
        Self { query_service }
    }
}
