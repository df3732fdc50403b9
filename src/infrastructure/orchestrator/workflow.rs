//! Query Workflow Orchestrator
//!
//! Drives one request through
//! `PREPROCESS -> RETRIEVE -> FILTER -> SYNTHESIZE -> GRADE` with a bounded
//! retry loop, then composes the accepted answer or, once the budget is spent,
//! the best-scoring degraded one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use tracing::{info, info_span, warn, Instrument};

use crate::domain::llm::Usage;
use crate::domain::query_workflow::{
    grade_draft, AnswerSynthesizer, AttemptOutcome, BestAttempt, ConversationContext,
    FaithfulnessGrader, GradedAnswer, Query, QueryPreprocessor, QueryWorkflowConfig,
    RiskCutoffs, StateMachine, WorkflowAttempt, WorkflowError, WorkflowResult, WorkflowState,
};
use crate::domain::retrieval::{FusedResult, RelevanceFilter};
use crate::infrastructure::fusion::RetrievalFusionEngine;
use crate::infrastructure::observability::{record_faithfulness_score, record_workflow_run};
use crate::infrastructure::synthesis::OutputComposer;

/// Stage implementations wired into an orchestrator
#[derive(Debug, Clone)]
pub struct WorkflowStages {
    pub preprocessor: Arc<dyn QueryPreprocessor>,
    pub fusion: Arc<RetrievalFusionEngine>,
    pub synthesizer: Arc<dyn AnswerSynthesizer>,
    pub grader: Arc<dyn FaithfulnessGrader>,
    pub composer: Arc<OutputComposer>,
}

#[derive(Debug)]
pub struct QueryWorkflowOrchestrator {
    stages: WorkflowStages,
    filter: RelevanceFilter,
    max_retries: u32,
    minimum_score: f32,
    risk_cutoffs: RiskCutoffs,
    request_timeout: Duration,
}

/// Mutable state of one run, owned by the retry loop
struct Run {
    machine: StateMachine,
    best: BestAttempt,
    history: Vec<WorkflowAttempt>,
    usage: Usage,
}

impl Run {
    fn new() -> Self {
        Self {
            machine: StateMachine::new(),
            best: BestAttempt::new(),
            history: Vec::new(),
            usage: Usage::default(),
        }
    }

    fn record(
        &mut self,
        index: u32,
        query: Query,
        evidence: FusedResult,
        graded: Option<GradedAnswer>,
        outcome: AttemptOutcome,
        error: Option<String>,
    ) {
        self.history.push(WorkflowAttempt {
            index,
            query,
            evidence,
            graded,
            outcome,
            error,
        });
    }

    /// Route a fatal stage error through `COMPOSE` to the failed terminal state
    fn fail(&mut self, error: WorkflowError) -> WorkflowError {
        let closed = self
            .machine
            .advance(WorkflowState::Compose)
            .and_then(|_| self.machine.advance(WorkflowState::Failed));

        if let Err(e) = closed {
            warn!(error = %e, "Could not close workflow state machine");
        }

        warn!(
            kind = error.kind(),
            error = %error,
            transitions = ?self.machine.trace(),
            "Workflow failed"
        );
        error
    }
}

impl QueryWorkflowOrchestrator {
    pub fn new(config: &QueryWorkflowConfig, stages: WorkflowStages) -> Self {
        Self {
            stages,
            filter: RelevanceFilter::new(config.relevance_threshold),
            max_retries: config.max_retries,
            minimum_score: config.minimum_score,
            risk_cutoffs: config.risk_cutoffs,
            request_timeout: config.request_timeout,
        }
    }

    /// Run the workflow for one question under the request deadline.
    ///
    /// When the deadline elapses the in-flight stage futures are dropped and
    /// `request_timeout` is returned.
    pub async fn run(
        &self,
        request_id: &str,
        question: &str,
        context: &ConversationContext,
    ) -> Result<WorkflowResult, WorkflowError> {
        let span = info_span!("query_workflow", request_id = %request_id);
        let started = Instant::now();
        let mut attempts = 0u32;

        let outcome = timeout(
            self.request_timeout,
            self.execute(question, context, &mut attempts)
                .instrument(span.clone()),
        )
        .await;

        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                let _entered = span.enter();
                warn!(
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    attempts = attempts,
                    "Workflow deadline elapsed"
                );
                Err(WorkflowError::request_timeout(
                    self.request_timeout.as_millis() as u64,
                ))
            }
        };

        let outcome = match &result {
            Ok(r) if r.degraded => "degraded",
            Ok(_) => "accepted",
            Err(e) => e.kind(),
        };
        record_workflow_run(outcome, attempts, started.elapsed());

        result
    }

    async fn execute(
        &self,
        question: &str,
        context: &ConversationContext,
        attempts: &mut u32,
    ) -> Result<WorkflowResult, WorkflowError> {
        let mut run = Run::new();
        let mut attempt: u32 = 0;

        loop {
            *attempts = attempt + 1;
            run.machine.advance(WorkflowState::Preprocess)?;
            let query = self
                .stages
                .preprocessor
                .preprocess(question, context, attempt)
                .await;

            info!(
                attempt = attempt,
                variants = query.variants().len(),
                hypothetical = query.hypothetical_embedding().is_some(),
                "Query preprocessed"
            );

            run.machine.advance(WorkflowState::Retrieve)?;
            let fused = match self.stages.fusion.retrieve(&query).await {
                Ok(outcome) => outcome.result,
                Err(e) => {
                    run.record(
                        attempt,
                        query,
                        FusedResult::empty(),
                        None,
                        AttemptOutcome::Failed,
                        Some(e.to_string()),
                    );
                    return Err(run.fail(e));
                }
            };

            run.machine.advance(WorkflowState::Filter)?;
            let retrieved = fused.len();
            let evidence = self.filter.apply(fused);
            info!(
                attempt = attempt,
                retrieved = retrieved,
                kept = evidence.len(),
                threshold = self.filter.threshold(),
                "Evidence filtered"
            );

            run.machine.advance(WorkflowState::Synthesize)?;
            let draft = match self
                .stages
                .synthesizer
                .synthesize(&query, evidence.clone())
                .await
            {
                Ok(draft) => draft,
                Err(e) => {
                    warn!(attempt = attempt, error = %e, "Synthesis failed for attempt");

                    if attempt < self.max_retries {
                        run.record(
                            attempt,
                            query,
                            evidence,
                            None,
                            AttemptOutcome::Retrying,
                            Some(e.to_string()),
                        );
                        run.machine.advance(WorkflowState::Retry)?;
                        attempt += 1;
                        continue;
                    }

                    if run.best.index().is_none() {
                        run.record(
                            attempt,
                            query,
                            evidence,
                            None,
                            AttemptOutcome::Failed,
                            Some(e.to_string()),
                        );
                        return Err(run.fail(e));
                    }

                    run.record(
                        attempt,
                        query,
                        evidence,
                        None,
                        AttemptOutcome::Exhausted,
                        Some(e.to_string()),
                    );
                    run.machine.advance(WorkflowState::Exhausted)?;
                    return self.compose_best(question, run, attempt + 1).await;
                }
            };

            run.usage = run.usage.add(draft.usage);

            run.machine.advance(WorkflowState::Grade)?;
            let graded = grade_draft(self.stages.grader.as_ref(), draft, self.minimum_score).await;
            if !graded.draft.no_evidence && graded.grading_error.is_none() {
                record_faithfulness_score(graded.score);
            }

            info!(
                attempt = attempt,
                score = graded.score,
                passed = graded.passed,
                minimum_score = self.minimum_score,
                "Answer graded"
            );

            run.best.offer(attempt, &graded);

            if graded.passed {
                run.record(
                    attempt,
                    query,
                    evidence,
                    Some(graded.clone()),
                    AttemptOutcome::Accepted,
                    None,
                );
                run.machine.advance(WorkflowState::Accept)?;
                return self
                    .compose(question, run, attempt, graded, false, attempt + 1)
                    .await;
            }

            if attempt < self.max_retries {
                run.record(
                    attempt,
                    query,
                    evidence,
                    Some(graded),
                    AttemptOutcome::Retrying,
                    None,
                );
                run.machine.advance(WorkflowState::Retry)?;
                attempt += 1;
                continue;
            }

            run.record(
                attempt,
                query,
                evidence,
                Some(graded),
                AttemptOutcome::Exhausted,
                None,
            );
            run.machine.advance(WorkflowState::Exhausted)?;
            return self.compose_best(question, run, attempt + 1).await;
        }
    }

    /// Compose the highest-scoring attempt of an exhausted run
    async fn compose_best(
        &self,
        question: &str,
        mut run: Run,
        attempts: u32,
    ) -> Result<WorkflowResult, WorkflowError> {
        let best = std::mem::take(&mut run.best);
        let Some((index, graded)) = best.into_inner() else {
            return Err(run.fail(WorkflowError::internal(
                "retry budget exhausted without a graded attempt",
            )));
        };

        info!(
            answer_attempt = index,
            score = graded.score,
            attempts = attempts,
            "Retry budget exhausted, returning best attempt"
        );

        self.compose(question, run, index, graded, true, attempts)
            .await
    }

    async fn compose(
        &self,
        question: &str,
        mut run: Run,
        answer_attempt: u32,
        graded: GradedAnswer,
        degraded: bool,
        attempts: u32,
    ) -> Result<WorkflowResult, WorkflowError> {
        run.machine.advance(WorkflowState::Compose)?;
        let output = self.stages.composer.compose(question, &graded).await;
        run.machine.advance(WorkflowState::Done)?;

        let hallucination_risk = self.risk_cutoffs.classify(graded.score);
        info!(
            attempts = attempts,
            answer_attempt = answer_attempt,
            degraded = degraded,
            score = graded.score,
            risk = %hallucination_risk,
            "Workflow completed"
        );

        Ok(WorkflowResult {
            answer: output.answer,
            citations: output.citations,
            suggested_questions: output.suggested_questions,
            degraded,
            attempts,
            answer_attempt,
            faithfulness_score: graded.score,
            hallucination_risk,
            output_format: output.output_format,
            model: graded.draft.model,
            usage: run.usage,
            history: run.history,
            transitions: run.machine.into_trace(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query_workflow::{
        ComposeOptions, HallucinationRisk, MockAnswerSynthesizer, MockFaithfulnessGrader,
        MockQueryPreprocessor, QuerySettings, INSUFFICIENT_INFORMATION_ANSWER,
    };
    use crate::domain::retrieval::{EvidenceOrigin, MockRetrievalSource};
    use crate::domain::retrieval::RetrievalSource;

    struct Harness {
        config: QueryWorkflowConfig,
        vector: Arc<dyn RetrievalSource>,
        graph: Option<Arc<dyn RetrievalSource>>,
        web: Option<Arc<dyn RetrievalSource>>,
        preprocessor: Arc<MockQueryPreprocessor>,
        synthesizer: Arc<MockAnswerSynthesizer>,
        grader: Arc<MockFaithfulnessGrader>,
    }

    impl Harness {
        fn new(grader: MockFaithfulnessGrader) -> Self {
            Self {
                config: settings(1).validate().unwrap(),
                vector: Arc::new(
                    MockRetrievalSource::new("vector", EvidenceOrigin::Vector)
                        .with_hit("doc-1", 0.9)
                        .with_hit("doc-2", 0.8),
                ),
                graph: None,
                web: None,
                preprocessor: Arc::new(MockQueryPreprocessor::new()),
                synthesizer: Arc::new(MockAnswerSynthesizer::new()),
                grader: Arc::new(grader),
            }
        }

        fn build(&self) -> QueryWorkflowOrchestrator {
            let mut fusion =
                RetrievalFusionEngine::new(self.vector.clone(), self.config.fusion_options());
            if let Some(ref graph) = self.graph {
                fusion = fusion.with_graph(graph.clone());
            }
            if let Some(ref web) = self.web {
                fusion = fusion.with_web(web.clone());
            }

            QueryWorkflowOrchestrator::new(
                &self.config,
                WorkflowStages {
                    preprocessor: self.preprocessor.clone(),
                    fusion: Arc::new(fusion),
                    synthesizer: self.synthesizer.clone(),
                    grader: self.grader.clone(),
                    composer: Arc::new(OutputComposer::new(compose_options())),
                },
            )
        }

        async fn run(&self) -> Result<WorkflowResult, WorkflowError> {
            self.build()
                .run("req-test", "What is LORA?", &ConversationContext::default())
                .await
        }
    }

    fn settings(max_retries: i64) -> QuerySettings {
        QuerySettings {
            max_retries,
            minimum_score: 0.7,
            relevance_threshold: 0.6,
            ..QuerySettings::default()
        }
    }

    fn compose_options() -> ComposeOptions {
        ComposeOptions {
            generate_citations: true,
            generate_suggested_questions: false,
            max_citations: 3,
            max_suggested_questions: 3,
            detect_output_format: false,
        }
    }

    #[tokio::test]
    async fn test_first_attempt_accepted() {
        let harness = Harness::new(MockFaithfulnessGrader::new(0.9));

        let result = harness.run().await.unwrap();

        assert!(!result.degraded);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.answer_attempt, 0);
        assert_eq!(result.answer, "answer 0 [1]");
        assert_eq!(result.hallucination_risk, HallucinationRisk::Low);
        assert_eq!(result.citations.unwrap()[0].source, "doc-1");
        assert_eq!(
            result.transitions,
            vec![
                WorkflowState::Start,
                WorkflowState::Preprocess,
                WorkflowState::Retrieve,
                WorkflowState::Filter,
                WorkflowState::Synthesize,
                WorkflowState::Grade,
                WorkflowState::Accept,
                WorkflowState::Compose,
                WorkflowState::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_retry_passes_on_second_attempt() {
        let harness = Harness::new(MockFaithfulnessGrader::with_scores(0.0, vec![0.5, 0.8]));

        let result = harness.run().await.unwrap();

        assert_eq!(harness.grader.call_count(), 2);
        assert_eq!(harness.preprocessor.attempts(), vec![0, 1]);
        assert!(!result.degraded);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.answer_attempt, 1);
        assert_eq!(result.answer, "answer 1 [1]");
        assert!((result.faithfulness_score - 0.8).abs() < 1e-6);
        assert_eq!(result.hallucination_risk, HallucinationRisk::Low);
        assert_eq!(result.history[0].outcome, AttemptOutcome::Retrying);
        assert_eq!(result.history[1].outcome, AttemptOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_exhausted_returns_best_scoring_attempt() {
        let harness = Harness::new(MockFaithfulnessGrader::with_scores(0.0, vec![0.5, 0.4]));

        let result = harness.run().await.unwrap();

        assert!(result.degraded);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.answer_attempt, 0);
        assert_eq!(result.answer, "answer 0 [1]");
        assert!((result.faithfulness_score - 0.5).abs() < 1e-6);
        assert_eq!(result.hallucination_risk, HallucinationRisk::High);
        assert_eq!(result.history[1].outcome, AttemptOutcome::Exhausted);
        assert!(result.transitions.contains(&WorkflowState::Exhausted));
        assert_eq!(result.answering_attempt().unwrap().index, 0);
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_fatal_without_retry() {
        let mut harness = Harness::new(MockFaithfulnessGrader::new(0.9));
        harness.vector = Arc::new(
            MockRetrievalSource::new("vector", EvidenceOrigin::Vector).with_error("down"),
        );
        harness.config = settings(3).validate().unwrap();
        harness.config.graph_search_enabled = true;
        harness.graph = Some(Arc::new(
            MockRetrievalSource::new("graph", EvidenceOrigin::Graph).with_error("down"),
        ));

        let err = harness.run().await.unwrap_err();

        assert_eq!(err.kind(), "retrieval_unavailable");
        assert_eq!(harness.preprocessor.attempts(), vec![0]);
        assert_eq!(harness.synthesizer.call_count(), 0);
        assert_eq!(harness.grader.call_count(), 0);
    }

    #[tokio::test]
    async fn test_attempts_bounded_by_max_retries() {
        for max_retries in 0..4 {
            let mut harness = Harness::new(MockFaithfulnessGrader::new(0.1));
            harness.config = settings(max_retries).validate().unwrap();

            let result = harness.run().await.unwrap();

            assert!(result.attempts >= 1);
            assert!(result.attempts as i64 <= max_retries + 1);
            assert_eq!(result.attempts as i64, max_retries + 1);
            assert!(result.history.iter().all(|a| a.index as i64 <= max_retries));
            assert!(result.degraded);
        }
    }

    #[tokio::test]
    async fn test_degraded_iff_no_attempt_passed() {
        let scripts = vec![
            vec![0.9],
            vec![0.2, 0.75],
            vec![0.2, 0.3, 0.65],
            vec![0.69, 0.7],
        ];

        for scores in scripts {
            let mut harness = Harness::new(MockFaithfulnessGrader::with_scores(0.0, scores));
            harness.config = settings(2).validate().unwrap();

            let result = harness.run().await.unwrap();
            let any_passed = result.history.iter().any(|a| a.passed());

            assert_eq!(result.degraded, !any_passed);
            if any_passed {
                assert!(result.answering_attempt().unwrap().passed());
            }
        }
    }

    #[tokio::test]
    async fn test_exhaustion_picks_maximum_not_last() {
        let mut harness =
            Harness::new(MockFaithfulnessGrader::with_scores(0.0, vec![0.3, 0.6, 0.1]));
        harness.config = settings(2).validate().unwrap();

        let result = harness.run().await.unwrap();

        let max = result
            .history
            .iter()
            .filter_map(|a| a.score())
            .fold(0.0f32, f32::max);
        assert!(result.degraded);
        assert_eq!(result.answer_attempt, 1);
        assert_eq!(result.faithfulness_score, max);
    }

    #[tokio::test]
    async fn test_evidence_respects_relevance_threshold() {
        let mut harness = Harness::new(MockFaithfulnessGrader::new(0.9));
        harness.vector = Arc::new(
            MockRetrievalSource::new("vector", EvidenceOrigin::Vector)
                .with_hit("high", 0.9)
                .with_hit("edge", 0.6)
                .with_hit("low", 0.3),
        );

        let result = harness.run().await.unwrap();

        for attempt in &result.history {
            assert!(attempt.evidence.chunks().iter().all(|c| c.score() >= 0.6));
        }
        assert_eq!(result.history[0].evidence.len(), 2);
    }

    #[tokio::test]
    async fn test_disabled_origins_absent_from_evidence() {
        let mut harness = Harness::new(MockFaithfulnessGrader::new(0.9));
        harness.graph = Some(Arc::new(
            MockRetrievalSource::new("graph", EvidenceOrigin::Graph).with_hit("g", 0.95),
        ));
        harness.web = Some(Arc::new(
            MockRetrievalSource::new("web", EvidenceOrigin::Web).with_hit("w", 0.95),
        ));

        let result = harness.run().await.unwrap();

        let origins: Vec<_> = result.history[0]
            .evidence
            .chunks()
            .iter()
            .map(|c| c.origin())
            .collect();
        assert!(!origins.contains(&EvidenceOrigin::Graph));
        assert!(!origins.contains(&EvidenceOrigin::Web));
    }

    #[tokio::test]
    async fn test_no_evidence_ends_degraded_with_explicit_answer() {
        let mut harness = Harness::new(MockFaithfulnessGrader::new(1.0));
        harness.vector = Arc::new(
            MockRetrievalSource::new("vector", EvidenceOrigin::Vector).with_hit("weak", 0.2),
        );

        let result = harness.run().await.unwrap();

        assert!(result.degraded);
        assert_eq!(result.answer, INSUFFICIENT_INFORMATION_ANSWER);
        assert_eq!(result.attempts, 2);
        assert_eq!(harness.grader.call_count(), 0);
    }

    #[tokio::test]
    async fn test_synthesis_failure_consumes_retry_slot() {
        let mut harness = Harness::new(MockFaithfulnessGrader::new(0.9));
        harness.synthesizer = Arc::new(MockAnswerSynthesizer::new().with_failures(vec![true]));

        let result = harness.run().await.unwrap();

        assert!(!result.degraded);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.answer_attempt, 1);
        assert!(result.history[0].error.is_some());
    }

    #[tokio::test]
    async fn test_synthesis_failure_without_graded_attempt_is_fatal() {
        let mut harness = Harness::new(MockFaithfulnessGrader::new(0.9));
        harness.synthesizer =
            Arc::new(MockAnswerSynthesizer::new().with_failures(vec![true, true]));

        let err = harness.run().await.unwrap_err();

        assert_eq!(err.kind(), "synthesis_failure");
    }

    #[tokio::test]
    async fn test_synthesis_failure_after_graded_attempt_returns_degraded_best() {
        let mut harness = Harness::new(MockFaithfulnessGrader::with_scores(0.0, vec![0.4]));
        harness.synthesizer =
            Arc::new(MockAnswerSynthesizer::new().with_failures(vec![false, true]));

        let result = harness.run().await.unwrap();

        assert!(result.degraded);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.answer_attempt, 0);
    }

    #[tokio::test]
    async fn test_grading_failure_triggers_retry() {
        let harness = Harness::new(MockFaithfulnessGrader::new(0.9).then_error("grader down"));

        let result = harness.run().await.unwrap();

        assert_eq!(result.attempts, 2);
        assert!(!result.degraded);
        assert!(!result.history[0].passed());
    }

    #[tokio::test]
    async fn test_request_deadline_cancels_run() {
        let mut harness = Harness::new(MockFaithfulnessGrader::new(0.9));
        harness.vector = Arc::new(
            MockRetrievalSource::new("vector", EvidenceOrigin::Vector)
                .with_hit("doc-1", 0.9)
                .with_delay(Duration::from_millis(400)),
        );
        harness.config.source_timeout = Duration::from_secs(5);
        harness.config.request_timeout = Duration::from_millis(50);

        let err = harness.run().await.unwrap_err();

        assert_eq!(err.kind(), "request_timeout");
        assert_eq!(harness.synthesizer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_usage_summed_over_attempts() {
        let harness = Harness::new(MockFaithfulnessGrader::with_scores(0.0, vec![0.5, 0.8]));

        let result = harness.run().await.unwrap();

        assert_eq!(result.usage.prompt_tokens, 200);
        assert_eq!(result.usage.completion_tokens, 40);
        assert_eq!(result.model, "mock-model");
    }
}
