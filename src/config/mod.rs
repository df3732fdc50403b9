//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, LogFormat, LoggingConfig, ModelsConfig, RetrievalConfig, ServerConfig,
    StorageBackend, StorageConfig, VectorBackend,
};
