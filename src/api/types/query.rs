use serde::{Deserialize, Serialize};

use crate::domain::llm::Usage;
use crate::domain::query_workflow::{Citation, ContextTurn, HallucinationRisk, OutputFormat};
use crate::infrastructure::services::{QueryOutcome, QueryRequest};

/// POST /v1/query body. Identity fields may also arrive as headers, which win.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryBody {
    pub query: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub context: Vec<ContextTurn>,
}

impl From<QueryBody> for QueryRequest {
    fn from(body: QueryBody) -> Self {
        QueryRequest {
            query: body.query,
            request_id: body.request_id,
            user_id: body.user_id,
            session_id: body.session_id,
            context: body.context,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub request_id: String,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_questions: Option<Vec<String>>,
    pub degraded: bool,
    pub attempts: u32,
    pub faithfulness_score: f32,
    pub hallucination_risk: HallucinationRisk,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    pub model: String,
    pub usage: Usage,
}

impl From<QueryOutcome> for QueryResponse {
    fn from(outcome: QueryOutcome) -> Self {
        let result = outcome.result;
        Self {
            request_id: outcome.request_id.to_string(),
            answer: result.answer,
            citations: result.citations,
            suggested_questions: result.suggested_questions,
            degraded: result.degraded,
            attempts: result.attempts,
            faithfulness_score: result.faithfulness_score,
            hallucination_risk: result.hallucination_risk,
            output_format: result.output_format,
            model: result.model,
            usage: result.usage,
        }
    }
}
