//! Fusion of per-source hit lists

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::EvidenceChunk;

/// Ordered, de-duplicated evidence capped at `top_k`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    chunks: Vec<EvidenceChunk>,
}

impl FusedResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Take already ranked candidates and keep the first `top_k`
    pub fn from_ranked(mut candidates: Vec<EvidenceChunk>, top_k: usize) -> Self {
        candidates.truncate(top_k);
        Self { chunks: candidates }
    }

    pub fn chunks(&self) -> &[EvidenceChunk] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<EvidenceChunk> {
        self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunk referenced by a 1-based citation marker
    pub fn get_numbered(&self, number: usize) -> Option<&EvidenceChunk> {
        number.checked_sub(1).and_then(|idx| self.chunks.get(idx))
    }

    pub(crate) fn retain(self, keep: impl Fn(&EvidenceChunk) -> bool) -> Self {
        Self {
            chunks: self.chunks.into_iter().filter(|c| keep(c)).collect(),
        }
    }
}

/// Merge hit lists into one ranked candidate list.
///
/// Batches are concatenated in the order given, duplicates by source id are
/// dropped (first occurrence wins) and the result is sorted by descending
/// score. Equal scores keep the lower source rank first, then arrival order.
pub fn merge_candidates(batches: Vec<Vec<EvidenceChunk>>) -> Vec<EvidenceChunk> {
    let mut seen = HashSet::new();
    let mut merged: Vec<EvidenceChunk> = batches
        .into_iter()
        .flatten()
        .filter(|chunk| seen.insert(chunk.source_id().to_string()))
        .collect();

    merged.sort_by(|a, b| {
        b.score()
            .total_cmp(&a.score())
            .then_with(|| a.rank().cmp(&b.rank()))
    });

    merged
}
