//! Output Composer
//!
//! Turns the accepted (or best degraded) answer into the user-facing payload.
//! Citations, follow-ups and format detection are additive: a failing
//! sub-call only omits its part.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

use crate::domain::query_workflow::{
    Citation, ComposeOptions, FollowUpGenerator, GradedAnswer, OutputFormat, OutputFormatDetector,
};
use crate::domain::retrieval::{EvidenceChunk, FusedResult};

static CITATION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d+(?:\s*,\s*\d+)*)\]").unwrap());

const SNIPPET_CHARS: usize = 200;

/// Composed parts of a workflow result
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedOutput {
    pub answer: String,
    pub citations: Option<Vec<Citation>>,
    pub suggested_questions: Option<Vec<String>>,
    pub output_format: Option<OutputFormat>,
}

#[derive(Debug)]
pub struct OutputComposer {
    options: ComposeOptions,
    follow_ups: Option<Arc<dyn FollowUpGenerator>>,
    format_detector: Option<Arc<dyn OutputFormatDetector>>,
}

impl OutputComposer {
    pub fn new(options: ComposeOptions) -> Self {
        Self {
            options,
            follow_ups: None,
            format_detector: None,
        }
    }

    pub fn with_follow_ups(mut self, generator: Arc<dyn FollowUpGenerator>) -> Self {
        self.follow_ups = Some(generator);
        self
    }

    pub fn with_format_detector(mut self, detector: Arc<dyn OutputFormatDetector>) -> Self {
        self.format_detector = Some(detector);
        self
    }

    pub async fn compose(&self, question: &str, graded: &GradedAnswer) -> ComposedOutput {
        let answer = graded.draft.text.clone();
        let evidence = &graded.draft.evidence;

        let citations = self
            .options
            .generate_citations
            .then(|| cite(&answer, evidence, self.options.max_citations));

        let (suggested_questions, output_format) = tokio::join!(
            self.suggest(question, &answer, evidence),
            self.detect_format(question, &answer)
        );

        ComposedOutput {
            answer,
            citations,
            suggested_questions,
            output_format,
        }
    }

    async fn suggest(
        &self,
        question: &str,
        answer: &str,
        evidence: &FusedResult,
    ) -> Option<Vec<String>> {
        if !self.options.generate_suggested_questions {
            return None;
        }

        if evidence.is_empty() {
            return Some(Vec::new());
        }

        let generator = self.follow_ups.as_ref()?;
        match generator
            .suggest(question, answer, evidence, self.options.max_suggested_questions)
            .await
        {
            Ok(questions) => Some(questions),
            Err(e) => {
                warn!(error = %e, "Follow-up generation failed, omitting suggestions");
                None
            }
        }
    }

    async fn detect_format(&self, question: &str, answer: &str) -> Option<OutputFormat> {
        if !self.options.detect_output_format {
            return None;
        }

        let Some(ref detector) = self.format_detector else {
            return Some(OutputFormat::default());
        };

        match detector.detect(question, answer).await {
            Ok(format) => Some(format),
            Err(e) => {
                warn!(error = %e, "Output format detection failed, using markdown");
                Some(OutputFormat::default())
            }
        }
    }
}

/// Evidence numbers referenced by `[n]` or `[n, m]` markers, in order of first mention
fn referenced_numbers(answer: &str) -> Vec<usize> {
    let mut seen = HashSet::new();
    CITATION_MARKER
        .captures_iter(answer)
        .filter_map(|c| c.get(1))
        .flat_map(|m| m.as_str().split(',').map(str::trim).collect::<Vec<_>>())
        .filter_map(|n| n.parse::<usize>().ok())
        .filter(|n| seen.insert(*n))
        .collect()
}

/// Citations for the chunks the answer references.
///
/// Without markers, the highest scoring chunks are cited: the draft was
/// written from the whole evidence block, so its strongest chunks are the
/// best available attribution. Either way at most `max_citations` distinct
/// sources are returned.
fn cite(answer: &str, evidence: &FusedResult, max_citations: usize) -> Vec<Citation> {
    let numbers = referenced_numbers(answer);

    let chunks: Vec<&EvidenceChunk> = if numbers.is_empty() {
        let mut ranked: Vec<&EvidenceChunk> = evidence.chunks().iter().collect();
        ranked.sort_by(|a, b| b.score().total_cmp(&a.score()));
        ranked
    } else {
        numbers
            .into_iter()
            .filter_map(|n| evidence.get_numbered(n))
            .collect()
    };

    let mut sources = HashSet::new();
    chunks
        .into_iter()
        .filter(|chunk| sources.insert(chunk.source_id()))
        .take(max_citations)
        .map(|chunk| Citation::new(chunk.source_id(), chunk.snippet(SNIPPET_CHARS)))
        .collect()
}
