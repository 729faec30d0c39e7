use codearena_common::store::StoreError;
use codearena_common::types::FieldError;
use std::time::Duration;
use thiserror::Error;

use crate::evaluator::EvaluationError;
use crate::harness::HarnessError;

/// Every way a single submission run can end without a verdict.
///
/// None of these are retried by the pipeline; `Dispatch` and `Fetch` are
/// transient and the caller may resubmit.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("invalid submission: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("problem '{0}' not found")]
    ProblemNotFound(String),

    #[error("language id {language_id} is not supported for this problem")]
    UnsupportedLanguageForProblem { language_id: u32 },

    #[error("unsupported language '{0}'")]
    UnsupportedLanguage(String),

    #[error("problem is misconfigured: {0}")]
    Configuration(String),

    #[error("failed to submit code to judge: {0}")]
    Dispatch(String),

    #[error("failed to fetch execution result: {0}")]
    Fetch(String),

    #[error("judge did not finish within {}s", .0.as_secs())]
    ExecutionTimeout(Duration),

    #[error("submission cancelled")]
    Cancelled,

    #[error("judge returned undecodable output: {0}")]
    Protocol(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SubmissionError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        SubmissionError::Validation(vec![FieldError::new(field, message)])
    }

    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            SubmissionError::Validation(_) => "validation_error",
            SubmissionError::ProblemNotFound(_) => "problem_not_found",
            SubmissionError::UnsupportedLanguageForProblem { .. } => {
                "unsupported_language_for_problem"
            }
            SubmissionError::UnsupportedLanguage(_) => "unsupported_language",
            SubmissionError::Configuration(_) => "configuration_error",
            SubmissionError::Dispatch(_) => "dispatch_error",
            SubmissionError::Fetch(_) => "fetch_error",
            SubmissionError::ExecutionTimeout(_) => "execution_timeout",
            SubmissionError::Cancelled => "cancelled",
            SubmissionError::Protocol(_) => "judge_protocol_error",
            SubmissionError::Store(_) => "store_error",
        }
    }

    /// Field-level details, empty for non-validation errors.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            SubmissionError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

impl From<HarnessError> for SubmissionError {
    fn from(err: HarnessError) -> Self {
        match err {
            HarnessError::UnsupportedLanguage(name) => SubmissionError::UnsupportedLanguage(name),
            HarnessError::InvalidFunctionName(_) | HarnessError::UnencodableInput { .. } => {
                SubmissionError::Configuration(err.to_string())
            }
        }
    }
}

impl From<EvaluationError> for SubmissionError {
    fn from(err: EvaluationError) -> Self {
        SubmissionError::Protocol(err.to_string())
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
