/// Submission Orchestrator - High-Level Orchestration
///
/// **Responsibility:**
/// Validate a submission, load its problem, and run
/// harness → judge → evaluator in that order.
///
/// This module is the glue layer - it knows nothing about:
/// - How harness source is generated (harness.rs)
/// - How the judge is reached (judge.rs)
/// - How outputs are compared (evaluator.rs)
///
/// Every failure short-circuits; nothing is retried and nothing is persisted here.

use crate::error::SubmissionError;
use crate::evaluator;
use crate::harness::{self, HarnessRegistry};
use crate::judge::{self, Judge, PollPolicy};
use codearena_common::store::ProblemStore;
use codearena_common::types::{Language, SubmissionRequest, ValidSubmission, Verdict};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, Span};

#[derive(Clone)]
pub struct SubmissionPipeline {
    problems: Arc<dyn ProblemStore>,
    judge: Arc<dyn Judge>,
    harnesses: HarnessRegistry,
    policy: PollPolicy,
}

impl SubmissionPipeline {
    pub fn new(problems: Arc<dyn ProblemStore>, judge: Arc<dyn Judge>, policy: PollPolicy) -> Self {
        Self {
            problems,
            judge,
            harnesses: HarnessRegistry::default(),
            policy,
        }
    }

    pub fn with_harnesses(mut self, harnesses: HarnessRegistry) -> Self {
        self.harnesses = harnesses;
        self
    }

    /// Run one submission end to end.
    #[instrument(
        skip_all,
        fields(problem_id = tracing::field::Empty, language_id = tracing::field::Empty)
    )]
    pub async fn run(
        &self,
        request: SubmissionRequest,
        cancel: &CancellationToken,
    ) -> Result<Verdict, SubmissionError> {
        // Step 1: request shape
        let submission = request.validate().map_err(SubmissionError::Validation)?;
        Span::current()
            .record("problem_id", submission.problem_id.as_str())
            .record("language_id", submission.language_id);

        // Step 2: problem
        let problem = self
            .problems
            .get_problem(&submission.problem_id)
            .await?
            .ok_or_else(|| SubmissionError::ProblemNotFound(submission.problem_id.clone()))?;

        // Step 3: language support
        let supported = problem
            .supported_language(submission.language_id)
            .ok_or(SubmissionError::UnsupportedLanguageForProblem {
                language_id: submission.language_id,
            })?;
        check_language_agreement(&submission, &supported.name)?;

        // Step 4: judge metadata
        let function_name = problem.function_name.trim();
        if function_name.is_empty() {
            return Err(SubmissionError::Configuration(format!(
                "problem '{}' has no functionName",
                problem.id
            )));
        }

        // Step 5: harness
        let harness_source =
            self.harnesses
                .build_harness(&submission.language_name, function_name, &problem.test_cases)?;
        let program = harness::assemble(&submission.code, &harness_source);
        debug!(
            test_cases = problem.test_cases.len(),
            program_bytes = program.len(),
            "Harness assembled"
        );

        if cancel.is_cancelled() {
            return Err(SubmissionError::Cancelled);
        }

        // Step 6: remote execution
        let start = Instant::now();
        let token = self.judge.submit(&program, submission.language_id).await?;
        info!(token = %token, "Submitted to judge");
        let job = judge::poll(self.judge.as_ref(), &token, self.policy, cancel).await?;

        // Step 7: verdict
        let verdict = evaluator::evaluate(&job, &problem.test_cases)?;

        info!(
            token = %token,
            status = %job.status,
            verdict = verdict.label(),
            judge_ms = start.elapsed().as_millis() as u64,
            "Submission judged"
        );

        Ok(verdict)
    }
}

/// When both names parse to a known language they must agree.
fn check_language_agreement(
    submission: &ValidSubmission,
    supported_name: &str,
) -> Result<(), SubmissionError> {
    let requested = Language::from_name(&submission.language_name);
    let registered = Language::from_name(supported_name);

    match (requested, registered) {
        (Some(requested), Some(registered)) if requested != registered => {
            Err(SubmissionError::validation(
                "languageName",
                format!(
                    "language '{}' does not match language_id {} ({})",
                    submission.language_name, submission.language_id, supported_name
                ),
            ))
        }
        _ => Ok(()),
    }
}
