//! Infrastructure layer - External service implementations

pub mod embedding;
pub mod fusion;
pub mod llm;
pub mod observability;
pub mod orchestrator;
pub mod persistence;
pub mod preprocess;
pub mod retrieval;
pub mod services;
pub mod synthesis;
