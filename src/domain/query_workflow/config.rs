//! Query workflow configuration
//!
//! `QuerySettings` is the raw, deserializable form read from the config
//! layer. It is validated once into the immutable [`QueryWorkflowConfig`],
//! from which each stage receives only the options it needs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{RiskCutoffs, WorkflowError};

/// Raw query settings as read from configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySettings {
    #[serde(default = "default_true")]
    pub query_rewrite_enabled: bool,
    #[serde(default)]
    pub query_expansion_enabled: bool,
    #[serde(default)]
    pub hypothetical_answer_enabled: bool,
    #[serde(default)]
    pub graph_search_enabled: bool,
    #[serde(default)]
    pub web_search_enabled: bool,
    #[serde(default)]
    pub rerank_enabled: bool,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_threshold")]
    pub relevance_threshold: f32,
    /// Signed so that a negative value is reported instead of failing to parse
    #[serde(default = "default_max_retries")]
    pub max_retries: i64,
    #[serde(default = "default_threshold")]
    pub minimum_score: f32,
    #[serde(default = "default_true")]
    pub generate_citations: bool,
    #[serde(default)]
    pub generate_suggested_documents: bool,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_source_timeout_ms")]
    pub source_timeout_ms: u64,
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
    #[serde(default = "default_three")]
    pub max_expansions: usize,
    #[serde(default = "default_three")]
    pub max_suggested_questions: usize,
    #[serde(default = "default_three")]
    pub max_citations: usize,
    #[serde(default)]
    pub detect_output_format: bool,
    /// Scores at or below this are reported as high hallucination risk
    #[serde(default = "default_high_risk_cutoff")]
    pub high_risk_cutoff: f32,
    /// Scores below this (and above `high_risk_cutoff`) are medium risk
    #[serde(default = "default_medium_risk_cutoff")]
    pub medium_risk_cutoff: f32,
    /// Answer greetings directly instead of running retrieval
    #[serde(default)]
    pub greeting_detection_enabled: bool,
}

fn default_true() -> bool {
    true
}

fn default_top_k() -> usize {
    5
}

fn default_threshold() -> f32 {
    0.7
}

fn default_max_retries() -> i64 {
    1
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_source_timeout_ms() -> u64 {
    5_000
}

fn default_history_turns() -> usize {
    5
}

fn default_three() -> usize {
    3
}

fn default_high_risk_cutoff() -> f32 {
    RiskCutoffs::default().high
}

fn default_medium_risk_cutoff() -> f32 {
    RiskCutoffs::default().medium
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            query_rewrite_enabled: default_true(),
            query_expansion_enabled: false,
            hypothetical_answer_enabled: false,
            graph_search_enabled: false,
            web_search_enabled: false,
            rerank_enabled: false,
            top_k: default_top_k(),
            relevance_threshold: default_threshold(),
            max_retries: default_max_retries(),
            minimum_score: default_threshold(),
            generate_citations: default_true(),
            generate_suggested_documents: false,
            request_timeout_ms: default_request_timeout_ms(),
            source_timeout_ms: default_source_timeout_ms(),
            history_turns: default_history_turns(),
            max_expansions: default_three(),
            max_suggested_questions: default_three(),
            max_citations: default_three(),
            detect_output_format: false,
            high_risk_cutoff: default_high_risk_cutoff(),
            medium_risk_cutoff: default_medium_risk_cutoff(),
            greeting_detection_enabled: false,
        }
    }
}

impl QuerySettings {
    /// Check ranges and produce the immutable workflow configuration
    pub fn validate(&self) -> Result<QueryWorkflowConfig, WorkflowError> {
        check_unit_interval("minimum_score", self.minimum_score)?;
        check_unit_interval("relevance_threshold", self.relevance_threshold)?;
        check_unit_interval("high_risk_cutoff", self.high_risk_cutoff)?;
        check_unit_interval("medium_risk_cutoff", self.medium_risk_cutoff)?;
        if self.high_risk_cutoff > self.medium_risk_cutoff {
            return Err(WorkflowError::config_validation(format!(
                "high_risk_cutoff ({}) must not exceed medium_risk_cutoff ({})",
                self.high_risk_cutoff, self.medium_risk_cutoff
            )));
        }

        if self.max_retries < 0 {
            return Err(WorkflowError::config_validation(format!(
                "max_retries must not be negative, got {}",
                self.max_retries
            )));
        }
        let max_retries = u32::try_from(self.max_retries).map_err(|_| {
            WorkflowError::config_validation(format!(
                "max_retries is too large: {}",
                self.max_retries
            ))
        })?;

        if self.top_k == 0 {
            return Err(WorkflowError::config_validation(
                "top_k must be greater than zero",
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(WorkflowError::config_validation(
                "request_timeout_ms must be greater than zero",
            ));
        }
        if self.source_timeout_ms == 0 {
            return Err(WorkflowError::config_validation(
                "source_timeout_ms must be greater than zero",
            ));
        }

        Ok(QueryWorkflowConfig {
            query_rewrite_enabled: self.query_rewrite_enabled,
            query_expansion_enabled: self.query_expansion_enabled,
            hypothetical_answer_enabled: self.hypothetical_answer_enabled,
            graph_search_enabled: self.graph_search_enabled,
            web_search_enabled: self.web_search_enabled,
            rerank_enabled: self.rerank_enabled,
            top_k: self.top_k,
            relevance_threshold: self.relevance_threshold,
            max_retries,
            minimum_score: self.minimum_score,
            generate_citations: self.generate_citations,
            generate_suggested_documents: self.generate_suggested_documents,
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            source_timeout: Duration::from_millis(self.source_timeout_ms),
            history_turns: self.history_turns,
            max_expansions: self.max_expansions,
            max_suggested_questions: self.max_suggested_questions,
            max_citations: self.max_citations,
            detect_output_format: self.detect_output_format,
            risk_cutoffs: RiskCutoffs {
                high: self.high_risk_cutoff,
                medium: self.medium_risk_cutoff,
            },
            greeting_detection_enabled: self.greeting_detection_enabled,
        })
    }
}

fn check_unit_interval(name: &str, value: f32) -> Result<(), WorkflowError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(WorkflowError::config_validation(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}

/// Validated, read-only workflow configuration shared by all requests
#[derive(Debug, Clone, PartialEq)]
pub struct QueryWorkflowConfig {
    pub query_rewrite_enabled: bool,
    pub query_expansion_enabled: bool,
    pub hypothetical_answer_enabled: bool,
    pub graph_search_enabled: bool,
    pub web_search_enabled: bool,
    pub rerank_enabled: bool,
    pub top_k: usize,
    pub relevance_threshold: f32,
    pub max_retries: u32,
    pub minimum_score: f32,
    pub generate_citations: bool,
    pub generate_suggested_documents: bool,
    pub request_timeout: Duration,
    pub source_timeout: Duration,
    pub history_turns: usize,
    pub max_expansions: usize,
    pub max_suggested_questions: usize,
    pub max_citations: usize,
    pub detect_output_format: bool,
    pub risk_cutoffs: RiskCutoffs,
    pub greeting_detection_enabled: bool,
}

impl QueryWorkflowConfig {
    pub fn preprocess_options(&self) -> PreprocessOptions {
        PreprocessOptions {
            rewrite_enabled: self.query_rewrite_enabled,
            expansion_enabled: self.query_expansion_enabled,
            hypothetical_answer_enabled: self.hypothetical_answer_enabled,
            max_expansions: self.max_expansions,
        }
    }

    pub fn fusion_options(&self) -> FusionOptions {
        FusionOptions {
            graph_search_enabled: self.graph_search_enabled,
            web_search_enabled: self.web_search_enabled,
            rerank_enabled: self.rerank_enabled,
            top_k: self.top_k,
            source_timeout: self.source_timeout,
        }
    }

    pub fn compose_options(&self) -> ComposeOptions {
        ComposeOptions {
            generate_citations: self.generate_citations,
            generate_suggested_questions: self.generate_suggested_documents,
            max_citations: self.max_citations,
            max_suggested_questions: self.max_suggested_questions,
            detect_output_format: self.detect_output_format,
        }
    }
}

/// Options consumed by the query preprocessor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessOptions {
    pub rewrite_enabled: bool,
    pub expansion_enabled: bool,
    pub hypothetical_answer_enabled: bool,
    pub max_expansions: usize,
}

/// Options consumed by the retrieval fusion engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionOptions {
    pub graph_search_enabled: bool,
    pub web_search_enabled: bool,
    pub rerank_enabled: bool,
    pub top_k: usize,
    pub source_timeout: Duration,
}

/// Options consumed by the output composer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComposeOptions {
    pub generate_citations: bool,
    pub generate_suggested_questions: bool,
    pub max_citations: usize,
    pub max_suggested_questions: usize,
    pub detect_output_format: bool,
}
