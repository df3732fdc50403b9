//! Draft and graded answers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::llm::Usage;
use crate::domain::retrieval::FusedResult;

/// Answer text returned when no evidence survived filtering
pub const INSUFFICIENT_INFORMATION_ANSWER: &str = "I don't have enough information in the available sources to answer this question.";

/// Generated answer before grading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftAnswer {
    pub text: String,
    pub evidence: FusedResult,
    pub model: String,
    pub usage: Usage,
    pub latency_ms: u64,
    /// Set when the answer states that evidence was missing
    pub no_evidence: bool,
}

impl DraftAnswer {
    pub fn new(
        text: impl Into<String>,
        evidence: FusedResult,
        model: impl Into<String>,
        usage: Usage,
        latency_ms: u64,
    ) -> Self {
        Self {
            text: text.into(),
            evidence,
            model: model.into(),
            usage,
            latency_ms,
            no_evidence: false,
        }
    }

    /// Explicit "not enough information" answer; no model was called
    pub fn insufficient_information() -> Self {
        Self {
            text: INSUFFICIENT_INFORMATION_ANSWER.to_string(),
            evidence: FusedResult::empty(),
            model: String::new(),
            usage: Usage::default(),
            latency_ms: 0,
            no_evidence: true,
        }
    }
}

/// Draft answer with its faithfulness verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedAnswer {
    pub draft: DraftAnswer,
    /// Faithfulness in [0, 1]
    pub score: f32,
    pub passed: bool,
    /// Set when the grader failed and the answer was failed conservatively
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grading_error: Option<String>,
}

impl GradedAnswer {
    /// Grade a draft with `passed = score >= minimum_score`
    pub fn new(draft: DraftAnswer, score: f32, minimum_score: f32) -> Self {
        let score = score.clamp(0.0, 1.0);
        Self {
            draft,
            score,
            passed: score >= minimum_score,
            grading_error: None,
        }
    }

    /// Conservative verdict used when grading itself failed
    pub fn failed_grading(draft: DraftAnswer, error: impl Into<String>) -> Self {
        Self {
            draft,
            score: 0.0,
            passed: false,
            grading_error: Some(error.into()),
        }
    }

    /// Verdict for a draft that had no evidence to be graded against
    pub fn ungraded_no_evidence(draft: DraftAnswer) -> Self {
        Self {
            draft,
            score: 0.0,
            passed: false,
            grading_error: None,
        }
    }
}

/// A reference from the answer back to a piece of evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub snippet: String,
}

impl Citation {
    pub fn new(source: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            snippet: snippet.into(),
        }
    }
}

/// Presentation hint for the answer text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Table,
    Code,
    Chart,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Table => "table",
            Self::Code => "code",
            Self::Chart => "chart",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "markdown" => Ok(Self::Markdown),
            "table" => Ok(Self::Table),
            "code" => Ok(Self::Code),
            "chart" => Ok(Self::Chart),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}
