//! HTTP middleware

mod logging;
mod metrics;

pub use logging::{request_id_middleware, REQUEST_ID_HEADER};
pub use metrics::metrics_middleware;
