//! Infrastructure services

mod query_service;

pub use query_service::{QueryOutcome, QueryRequest, QueryService, ANONYMOUS};
