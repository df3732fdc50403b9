//! Relevance filtering of fused evidence

use super::FusedResult;

/// Drops chunks scoring below a fixed threshold
#[derive(Debug, Clone, Copy)]
pub struct RelevanceFilter {
    threshold: f32,
}

impl RelevanceFilter {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Keep chunks with `score >= threshold`, preserving order.
    ///
    /// An empty result is a valid outcome, the synthesizer handles it.
    pub fn apply(&self, fused: FusedResult) -> FusedResult {
        let threshold = self.threshold;
        fused.retain(|chunk| chunk.score() >= threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::retrieval::{merge_candidates, EvidenceChunk, EvidenceOrigin};

    fn candidates(scores: &[f32]) -> Vec<EvidenceChunk> {
        scores
            .iter()
            .enumerate()
            .map(|(i, score)| {
                EvidenceChunk::new(
                    format!("lora-{}", i),
                    format!("LoRA passage {}", i),
                    EvidenceOrigin::Vector,
                    *score,
                )
                .with_rank(i)
            })
            .collect()
    }

    #[test]
    fn test_lora_query_keeps_three_above_threshold() {
        let merged = merge_candidates(vec![candidates(&[0.9, 0.7, 0.6, 0.55, 0.3])]);
        let fused = FusedResult::from_ranked(merged, 5);

        let filtered = RelevanceFilter::new(0.6).apply(fused);

        let scores: Vec<f32> = filtered.chunks().iter().map(|c| c.score()).collect();
        assert_eq!(scores, vec![0.9, 0.7, 0.6]);
        let ids: Vec<&str> = filtered.chunks().iter().map(|c| c.source_id()).collect();
        assert_eq!(ids, vec!["lora-0", "lora-1", "lora-2"]);
    }

    #[test]
    fn test_every_survivor_meets_threshold() {
        let merged = merge_candidates(vec![candidates(&[0.1, 0.95, 0.49, 0.5, 0.51, 0.0, 1.0])]);
        let filtered = RelevanceFilter::new(0.5).apply(FusedResult::from_ranked(merged, 10));

        assert_eq!(filtered.len(), 4);
        assert!(filtered.chunks().iter().all(|c| c.score() >= 0.5));
    }

    #[test]
    fn test_everything_filtered_is_empty_not_error() {
        let merged = merge_candidates(vec![candidates(&[0.2, 0.1])]);
        let filtered = RelevanceFilter::new(0.6).apply(FusedResult::from_ranked(merged, 5));

        assert!(filtered.is_empty());
    }
}
