//! Retrieval fusion - concurrent multi-source search

mod engine;

pub use engine::{FusionOutcome, RetrievalFusionEngine};
