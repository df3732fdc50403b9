//! Query workflow domain
//!
//! Data model, configuration, error taxonomy and state machine of the
//! retrieval-augmented query pipeline. The orchestrator driving it lives in
//! `infrastructure::orchestrator`.

mod answer;
mod attempt;
mod config;
mod error;
mod query;
mod result;
mod stages;
mod risk;
mod state;

pub use answer::{
    Citation, DraftAnswer, GradedAnswer, OutputFormat, INSUFFICIENT_INFORMATION_ANSWER,
};
pub use attempt::{AttemptOutcome, BestAttempt, WorkflowAttempt};
pub use config::{
    ComposeOptions, FusionOptions, PreprocessOptions, QuerySettings, QueryWorkflowConfig,
};
pub use error::WorkflowError;
pub use query::{ContextTurn, ConversationContext, Query};
pub use result::{WorkflowResult, GREETING_ANSWER};
pub use risk::{HallucinationRisk, RiskCutoffs};
pub use stages::{
    grade_draft, AnswerSynthesizer, FaithfulnessGrader, FollowUpGenerator, GreetingDetector,
    OutputFormatDetector, QueryPreprocessor,
};
pub use state::{StateMachine, WorkflowState};

#[cfg(test)]
pub use stages::mock::{
    MockAnswerSynthesizer, MockFaithfulnessGrader, MockFollowUpGenerator, MockGreetingDetector,
    MockQueryPreprocessor,
};
