//! Answer generation, grading and output composition

mod composer;
mod follow_up;
mod format;
mod grader;
mod synthesizer;

pub use composer::{ComposedOutput, OutputComposer};
pub use follow_up::LlmFollowUpGenerator;
pub use format::LlmOutputFormatDetector;
pub use grader::LlmFaithfulnessGrader;
pub use synthesizer::LlmAnswerSynthesizer;

use crate::domain::retrieval::FusedResult;

/// Render evidence as a numbered source list for prompts
pub(crate) fn numbered_evidence(evidence: &FusedResult) -> String {
    evidence
        .chunks()
        .iter()
        .enumerate()
        .map(|(i, chunk)| match chunk.title() {
            Some(title) => format!("[{}] {} ({})\n{}", i + 1, title, chunk.source_id(), chunk.content()),
            None => format!("[{}] ({})\n{}", i + 1, chunk.source_id(), chunk.content()),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::retrieval::{EvidenceChunk, EvidenceOrigin};

    #[test]
    fn test_numbered_evidence() {
        let evidence = FusedResult::from_ranked(
            vec![
                EvidenceChunk::new("doc-1", "first", EvidenceOrigin::Vector, 0.9)
                    .with_title("Intro"),
                EvidenceChunk::new("doc-2", "second", EvidenceOrigin::Graph, 0.8),
            ],
            5,
        );

        assert_eq!(
            numbered_evidence(&evidence),
            "[1] Intro (doc-1)\nfirst\n\n[2] (doc-2)\nsecond"
        );
    }
}
