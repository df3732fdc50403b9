//! Embedding response types

use serde::{Deserialize, Serialize};

/// A single embedding vector with its position in the request batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    index: usize,
    vector: Vec<f32>,
}

impl Embedding {
    pub fn new(index: usize, vector: Vec<f32>) -> Self {
        Self { index, vector }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn into_vector(self) -> Vec<f32> {
        self.vector
    }
}

/// Calculate cosine similarity between two vectors
///
/// Mismatched or empty inputs yield 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Response from an embedding request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    model: String,
    data: Vec<Embedding>,
    total_tokens: u32,
}

impl EmbeddingResponse {
    pub fn new(model: String, mut data: Vec<Embedding>, total_tokens: u32) -> Self {
        data.sort_by_key(|e| e.index());
        Self {
            model,
            data,
            total_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn embeddings(&self) -> &[Embedding] {
        &self.data
    }

    pub fn total_tokens(&self) -> u32 {
        self.total_tokens
    }

    /// Vectors in request order
    pub fn into_vectors(self) -> Vec<Vec<f32>> {
        self.data.into_iter().map(Embedding::into_vector).collect()
    }
}
