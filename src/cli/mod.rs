//! Command line interface
//!
//! - `serve`: run the HTTP API
//! - `ask`: answer one question and print the JSON result

pub mod ask;
pub mod serve;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::observability::init_tracing;

/// RAG Query Engine - grounded answers with faithfulness grading
#[derive(Parser)]
#[command(name = "rag-query-engine")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve(serve::ServeArgs),

    /// Answer a single question from the command line
    Ask(ask::AskArgs),
}

/// Load configuration and install the global subscriber
fn bootstrap() -> anyhow::Result<AppConfig> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging, &config.observability.tracing);
    Ok(config)
}
