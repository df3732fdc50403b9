//! Hallucination risk banding of a faithfulness score

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse reading of the faithfulness score for callers that do not want
/// to interpret the raw number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HallucinationRisk {
    High,
    Medium,
    Low,
}

impl HallucinationRisk {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for HallucinationRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score cutoffs: `score <= high` is high risk, `score < medium` is medium,
/// anything else is low
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskCutoffs {
    pub high: f32,
    pub medium: f32,
}

impl Default for RiskCutoffs {
    fn default() -> Self {
        Self {
            high: 0.6,
            medium: 0.8,
        }
    }
}

impl RiskCutoffs {
    pub fn classify(&self, score: f32) -> HallucinationRisk {
        if score <= self.high {
            HallucinationRisk::High
        } else if score < self.medium {
            HallucinationRisk::Medium
        } else {
            HallucinationRisk::Low
        }
    }
}
