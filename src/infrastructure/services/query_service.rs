//! Query service - request validation, history, orchestration and persistence

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use validator::{Validate, ValidationError};

use crate::domain::interaction::{
    ConversationRepository, ConversationTurn, InteractionRecord, InteractionRepository, RequestId,
};
use crate::domain::query_workflow::{
    ContextTurn, ConversationContext, GreetingDetector, WorkflowError, WorkflowResult,
};
use crate::infrastructure::observability::record_workflow_run;
use crate::infrastructure::orchestrator::QueryWorkflowOrchestrator;

/// Identity used when the caller sends none
pub const ANONYMOUS: &str = "anonymous";

const READINESS_PROBE_ID: &str = "readiness-probe";

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("query must not be empty".into()));
    }
    Ok(())
}

/// One incoming question
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(custom(function = "not_blank"), length(max = 8000))]
    pub query: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Prior turns supplied by the caller; overrides stored history
    #[serde(default)]
    pub context: Vec<ContextTurn>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_session(mut self, user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self.session_id = Some(session_id.into());
        self
    }
}

/// Workflow result tagged with the request id it was recorded under
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub request_id: RequestId,
    pub result: WorkflowResult,
}

pub struct QueryService {
    orchestrator: Arc<QueryWorkflowOrchestrator>,
    interactions: Arc<dyn InteractionRepository>,
    conversations: Arc<dyn ConversationRepository>,
    greetings: Option<Arc<dyn GreetingDetector>>,
    history_turns: usize,
}

impl std::fmt::Debug for QueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService")
            .field("orchestrator", &self.orchestrator)
            .field("greetings", &self.greetings)
            .field("history_turns", &self.history_turns)
            .finish()
    }
}

impl QueryService {
    pub fn new(
        orchestrator: Arc<QueryWorkflowOrchestrator>,
        interactions: Arc<dyn InteractionRepository>,
        conversations: Arc<dyn ConversationRepository>,
        history_turns: usize,
    ) -> Self {
        Self {
            orchestrator,
            interactions,
            conversations,
            greetings: None,
            history_turns,
        }
    }

    /// Answer greetings with a canned reply instead of running the workflow
    pub fn with_greeting_detector(mut self, detector: Arc<dyn GreetingDetector>) -> Self {
        self.greetings = Some(detector);
        self
    }

    /// Answer one question.
    ///
    /// Invalid requests are rejected before the workflow starts. Every request
    /// that reaches the workflow is recorded once under its request id;
    /// persistence problems are logged and never change the outcome.
    pub async fn answer(&self, request: QueryRequest) -> Result<QueryOutcome, WorkflowError> {
        request.validate().map_err(|e| {
            WorkflowError::invalid_request(
                e.field_errors()
                    .values()
                    .flat_map(|errors| errors.iter())
                    .map(|error| {
                        error
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| error.code.to_string())
                    })
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        })?;

        let request_id = request
            .request_id
            .as_deref()
            .map(RequestId::new)
            .unwrap_or_else(RequestId::generate);
        let user_id = request.user_id.clone().unwrap_or_else(|| ANONYMOUS.to_string());
        let session_id = request.session_id.clone().unwrap_or_else(|| request_id.to_string());
        let question = request.query.trim().to_string();

        let started_at = Utc::now();
        let started = Instant::now();
        let result = if self.is_greeting(&question).await {
            info!(request_id = %request_id, user_id = %user_id, "Greeting answered directly");
            record_workflow_run("greeting", 0, started.elapsed());
            Ok(WorkflowResult::greeting())
        } else {
            let context = if request.context.is_empty() {
                self.load_context(&user_id, &session_id).await
            } else {
                ConversationContext::new(request.context)
            };

            info!(
                request_id = %request_id,
                user_id = %user_id,
                context_turns = context.turns().len(),
                "Processing query"
            );

            self.orchestrator
                .run(request_id.as_str(), &question, &context)
                .await
        };

        let record = InteractionRecord {
            request_id: request_id.clone(),
            user_id: user_id.clone(),
            session_id: session_id.clone(),
            prompt: question.clone(),
            response: result.as_ref().map(|r| r.answer.clone()).unwrap_or_default(),
            model: result.as_ref().map(|r| r.model.clone()).unwrap_or_default(),
            prompt_tokens: result.as_ref().map(|r| r.usage.prompt_tokens).unwrap_or(0),
            completion_tokens: result
                .as_ref()
                .map(|r| r.usage.completion_tokens)
                .unwrap_or(0),
            total_tokens: result.as_ref().map(|r| r.usage.total_tokens).unwrap_or(0),
            latency_ms: started.elapsed().as_millis() as u64,
            attempts: result.as_ref().map(|r| r.attempts).unwrap_or(0),
            degraded: result.as_ref().map(|r| r.degraded).unwrap_or(false),
            faithfulness_score: result.as_ref().ok().map(|r| r.faithfulness_score),
            error_kind: result.as_ref().err().map(|e| e.kind().to_string()),
            started_at,
            completed_at: Utc::now(),
        };
        self.record_interaction(record).await;

        let result = result?;

        let turn = ConversationTurn::new(
            request_id.clone(),
            user_id,
            session_id,
            question,
            result.answer.clone(),
        );
        self.record_turn(turn).await;

        Ok(QueryOutcome { request_id, result })
    }

    /// Readiness probe: a lookup that touches the interaction store
    pub async fn check_storage(&self) -> Result<(), WorkflowError> {
        self.interactions
            .find_by_request_id(READINESS_PROBE_ID)
            .await
            .map(|_| ())
            .map_err(WorkflowError::from)
    }

    /// Classification failures fall through to the full workflow
    async fn is_greeting(&self, question: &str) -> bool {
        let Some(ref detector) = self.greetings else {
            return false;
        };

        match detector.is_greeting(question).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, "Greeting detection failed, running full workflow");
                false
            }
        }
    }

    async fn load_context(&self, user_id: &str, session_id: &str) -> ConversationContext {
        if self.history_turns == 0 {
            return ConversationContext::default();
        }

        match self
            .conversations
            .recent_turns(user_id, session_id, self.history_turns)
            .await
        {
            Ok(turns) => {
                ConversationContext::new(turns.iter().map(ConversationTurn::to_context_turn).collect())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load conversation history, continuing without it");
                ConversationContext::default()
            }
        }
    }

    async fn record_interaction(&self, record: InteractionRecord) {
        let request_id = record.request_id.clone();
        match self.interactions.insert_once(record).await {
            Ok(true) => debug!(request_id = %request_id, "Interaction recorded"),
            Ok(false) => debug!(request_id = %request_id, "Interaction already recorded"),
            Err(e) => warn!(
                request_id = %request_id,
                kind = WorkflowError::from(e.clone()).kind(),
                error = %e,
                "Failed to record interaction"
            ),
        }
    }

    async fn record_turn(&self, turn: ConversationTurn) {
        let request_id = turn.request_id.clone();
        match self.conversations.insert_once(turn).await {
            Ok(true) => debug!(request_id = %request_id, "Conversation turn recorded"),
            Ok(false) => debug!(request_id = %request_id, "Conversation turn already recorded"),
            Err(e) => warn!(
                request_id = %request_id,
                kind = WorkflowError::from(e.clone()).kind(),
                error = %e,
                "Failed to record conversation turn"
            ),
        }
    }
}
