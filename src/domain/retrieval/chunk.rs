//! Evidence chunk value objects

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which kind of search produced a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceOrigin {
    Vector,
    Graph,
    Web,
}

impl EvidenceOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Graph => "graph",
            Self::Web => "web",
        }
    }

    /// Position in the merge order (vector first, web last)
    pub fn merge_priority(&self) -> u8 {
        match self {
            Self::Vector => 0,
            Self::Graph => 1,
            Self::Web => 2,
        }
    }
}

impl fmt::Display for EvidenceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of retrieved evidence.
///
/// Chunks are never mutated after retrieval; re-scoring produces a new chunk
/// through [`EvidenceChunk::rescored`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceChunk {
    source_id: String,
    content: String,
    origin: EvidenceOrigin,
    score: f32,
    rank: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
}

impl EvidenceChunk {
    pub fn new(
        source_id: impl Into<String>,
        content: impl Into<String>,
        origin: EvidenceOrigin,
        score: f32,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            content: content.into(),
            origin,
            score,
            rank: 0,
            title: None,
        }
    }

    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Copy of this chunk carrying a new relevance score
    pub fn rescored(&self, score: f32) -> Self {
        Self {
            score,
            ..self.clone()
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn origin(&self) -> EvidenceOrigin {
        self.origin
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// First `max_chars` characters of the content, cut on a char boundary
    pub fn snippet(&self, max_chars: usize) -> String {
        let trimmed = self.content.trim();
        match trimmed.char_indices().nth(max_chars) {
            Some((idx, _)) => format!("{}...", trimmed[..idx].trim_end()),
            None => trimmed.to_string(),
        }
    }
}
