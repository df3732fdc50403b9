//! Ask command - answers one question and prints the result as JSON

use clap::Args;

use crate::infrastructure::observability::shutdown_tracing;
use crate::infrastructure::services::QueryRequest;

#[derive(Args, Clone, Debug)]
pub struct AskArgs {
    /// The question to answer
    pub query: String,

    /// Caller identity used for conversation history
    #[arg(long)]
    pub user: Option<String>,

    /// Conversation session; prior turns of this session are used as context
    #[arg(long)]
    pub session: Option<String>,

    /// Idempotency key; a replayed id is recorded once
    #[arg(long)]
    pub request_id: Option<String>,

    /// Include the attempt history and state transitions
    #[arg(long)]
    pub verbose: bool,
}

impl From<AskArgs> for QueryRequest {
    fn from(args: AskArgs) -> Self {
        QueryRequest {
            query: args.query,
            request_id: args.request_id,
            user_id: args.user,
            session_id: args.session,
            context: Vec::new(),
        }
    }
}

pub async fn run(args: AskArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let service = crate::build_query_service(&config).await?;

    let verbose = args.verbose;
    let outcome = service.answer(args.into()).await;
    shutdown_tracing();
    let outcome = outcome?;

    let output = if verbose {
        serde_json::to_string_pretty(&outcome.result)?
    } else {
        serde_json::to_string_pretty(&serde_json::json!({
            "request_id": outcome.request_id.as_str(),
            "answer": outcome.result.answer,
            "citations": outcome.result.citations,
            "suggested_questions": outcome.result.suggested_questions,
            "degraded": outcome.result.degraded,
            "attempts": outcome.result.attempts,
            "faithfulness_score": outcome.result.faithfulness_score,
            "hallucination_risk": outcome.result.hallucination_risk,
        }))?
    };
    println!("{}", output);

    Ok(())
}
