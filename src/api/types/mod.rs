//! Request/response types shared by the HTTP handlers

pub mod error;
pub mod json;
pub mod query;

pub use error::{ApiError, ApiErrorDetail, ApiErrorResponse, ApiErrorType};
pub use json::Json;
pub use query::{QueryBody, QueryResponse};
