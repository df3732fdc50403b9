//! Query values produced by preprocessing

use serde::{Deserialize, Serialize};

/// A question as prepared for one attempt.
///
/// Immutable once built; a retry builds a fresh `Query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    original: String,
    variants: Vec<String>,
    #[serde(skip)]
    hypothetical_embedding: Option<Vec<f32>>,
}

impl Query {
    /// Query with no rewriting applied
    pub fn plain(original: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            variants: Vec::new(),
            hypothetical_embedding: None,
        }
    }

    /// Build a query, dropping empty and repeated variants
    pub fn new(
        original: impl Into<String>,
        variants: Vec<String>,
        hypothetical_embedding: Option<Vec<f32>>,
    ) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(variants.len());
        for variant in variants {
            let variant = variant.trim().to_string();
            if !variant.is_empty() && !unique.contains(&variant) {
                unique.push(variant);
            }
        }

        Self {
            original: original.into(),
            variants: unique,
            hypothetical_embedding,
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    pub fn hypothetical_embedding(&self) -> Option<&[f32]> {
        self.hypothetical_embedding.as_deref()
    }

    /// Text used for synthesis: the first variant, else the original
    pub fn primary_text(&self) -> &str {
        self.variants
            .first()
            .map(String::as_str)
            .unwrap_or(&self.original)
    }

    /// Every distinct text to search with
    pub fn search_texts(&self) -> Vec<&str> {
        if self.variants.is_empty() {
            vec![self.original.as_str()]
        } else {
            self.variants.iter().map(String::as_str).collect()
        }
    }
}

/// One prior exchange in the same session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextTurn {
    pub question: String,
    pub answer: String,
}

impl ContextTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Prior-turn context handed to the rewriter, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    turns: Vec<ContextTurn>,
}

impl ConversationContext {
    pub fn new(turns: Vec<ContextTurn>) -> Self {
        Self { turns }
    }

    pub fn turns(&self) -> &[ContextTurn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Render as a plain transcript for prompts
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|turn| format!("User: {}\nAssistant: {}", turn.question, turn.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
