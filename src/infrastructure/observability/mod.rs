//! Observability infrastructure - Tracing, Metrics, and Logging

mod config;
mod metrics;
mod tracing_setup;

pub use config::{MetricsConfig, ObservabilityConfig, TracingConfig};
pub use metrics::{
    create_metrics_router, init_metrics, record_faithfulness_score, record_http_request,
    record_retrieval_source, record_workflow_run, PrometheusMetrics,
};
pub use tracing_setup::{init_tracing, shutdown_tracing};
