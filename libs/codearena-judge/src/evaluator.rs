/// Verdict Evaluator - Judge Output to Per-Test Verdicts
///
/// **Core Responsibility:**
/// Decode a terminal judge job and compare its output against the expected
/// output of every test case.
///
/// **Critical Properties:**
/// - Knows nothing about HTTP
/// - Knows nothing about language runtimes
/// - Pure function: (terminal job, test cases) → verdict; calling it twice
///   yields the same verdict
///
/// **Outcomes:**
/// - Compilation error → `CompilationFailure` with the compiler output, no test results
/// - Runtime-class status (runtime errors, time limit, judge-side failures)
///   → `RuntimeFailure` with stderr and the status description
/// - Program ran to completion → one `TestResult` per test case
///
/// **Alignment Rules:**
/// - stdout is split on `\n`; line `i` belongs to test case `i`
/// - a missing line is received as the empty string (and fails unless the
///   expected output is empty)
///
/// **Normalization Rules:**
/// - Trim leading and trailing whitespace on both sides: YES
/// - Case sensitivity: YES (exact match required)
/// - Floating-point tolerance: NO

use crate::judge::{JudgeJob, JudgeStatus};
use base64::{engine::general_purpose, Engine as _};
use codearena_common::types::{TestCase, TestResult, Verdict, VerdictReport};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("job {token} is not finished (status {status})")]
    NotTerminal { token: String, status: JudgeStatus },
    #[error("{field} is not valid base64")]
    Base64 { field: &'static str },
}

/// Normalize output string for comparison
///
/// Trims leading/trailing whitespace, which also absorbs `\r\n` endings.
/// Internal whitespace and case are preserved.
fn normalize_output(output: &str) -> &str {
    output.trim()
}

/// Decode an optional base64 field. Judge0 wraps long payloads with newlines,
/// so whitespace is dropped before decoding. Program output may be any bytes;
/// invalid UTF-8 is replaced rather than rejected.
fn decode_field(field: &'static str, value: Option<&str>) -> Result<String, EvaluationError> {
    let Some(encoded) = value else {
        return Ok(String::new());
    };
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = general_purpose::STANDARD
        .decode(compact)
        .map_err(|_| EvaluationError::Base64 { field })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Compare one test case against the line its harness statement printed.
pub fn evaluate_test(test_case: &TestCase, received_line: Option<&str>) -> TestResult {
    let received = normalize_output(received_line.unwrap_or("")).to_string();
    let expected = normalize_output(&test_case.expected_output).to_string();
    let passed = received == expected;

    TestResult {
        input: test_case.input.clone(),
        expected,
        received,
        passed,
    }
}

/// Align stdout lines with test cases and build the report.
pub fn aggregate_results(stdout: &str, test_cases: &[TestCase]) -> VerdictReport {
    let lines: Vec<&str> = stdout.split('\n').collect();

    let results = test_cases
        .iter()
        .enumerate()
        .map(|(idx, test_case)| evaluate_test(test_case, lines.get(idx).copied()))
        .collect();

    VerdictReport::new(results)
}

/// Evaluate a terminal judge job against the problem's test cases
///
/// This is the main entry point for evaluation. It short-circuits on
/// compilation and runtime failures and otherwise delegates to
/// `aggregate_results`.
pub fn evaluate(job: &JudgeJob, test_cases: &[TestCase]) -> Result<Verdict, EvaluationError> {
    match job.status {
        JudgeStatus::Queued | JudgeStatus::Processing => Err(EvaluationError::NotTerminal {
            token: job.token.clone(),
            status: job.status,
        }),
        JudgeStatus::CompilationError => Ok(Verdict::CompilationFailure {
            compile_output: decode_field("compile_output", job.compile_output.as_deref())?,
        }),
        // Wrong Answer only appears when the judge was given an expected
        // output; either way the program ran to completion.
        JudgeStatus::Accepted | JudgeStatus::WrongAnswer => {
            let stdout = decode_field("stdout", job.stdout.as_deref())?;
            Ok(Verdict::Evaluated(aggregate_results(&stdout, test_cases)))
        }
        JudgeStatus::TimeLimitExceeded
        | JudgeStatus::RuntimeError(_)
        | JudgeStatus::InternalError
        | JudgeStatus::ExecFormatError
        | JudgeStatus::Unknown(_) => {
            let mut stderr = decode_field("stderr", job.stderr.as_deref())?;
            if stderr.is_empty() {
                stderr = decode_field("message", job.message.as_deref())?;
            }
            Ok(Verdict::RuntimeFailure {
                status: job.description.clone(),
                stderr,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(text: &str) -> String {
        general_purpose::STANDARD.encode(text)
    }

    /// Helper to create a test case
    fn make_test_case(a: i64, b: i64, expected_output: &str) -> TestCase {
        TestCase {
            input: vec![json!(a), json!(b)],
            expected_output: expected_output.to_string(),
        }
    }

    fn sum_cases() -> Vec<TestCase> {
        vec![make_test_case(2, 3, "5"), make_test_case(1, 1, "2")]
    }

    /// Helper to create a finished job
    fn make_job(status: JudgeStatus, stdout: Option<&str>) -> JudgeJob {
        JudgeJob {
            stdout: stdout.map(encode),
            ..JudgeJob::pending("tok", status)
        }
    }

    fn report(verdict: Verdict) -> VerdictReport {
        match verdict {
            Verdict::Evaluated(report) => report,
            other => panic!("expected evaluated verdict, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_output() {
        assert_eq!(normalize_output("hello"), "hello");
        assert_eq!(normalize_output("  hello  "), "hello");
        assert_eq!(normalize_output("hello\r"), "hello");
        assert_eq!(normalize_output("   "), "");
    }

    #[test]
    fn test_all_pass() {
        let job = make_job(JudgeStatus::Accepted, Some("5\n2\n"));
        let report = report(evaluate(&job, &sum_cases()).unwrap());

        assert!(report.all_passed);
        assert_eq!(report.test_results.len(), 2);
        assert!(report.test_results.iter().all(|r| r.passed));
        assert_eq!(report.summary(), "All test cases passed!");
    }

    #[test]
    fn test_wrong_answer_reports_received_value() {
        let job = make_job(JudgeStatus::Accepted, Some("0\n0\n"));
        let report = report(evaluate(&job, &sum_cases()).unwrap());

        assert!(!report.all_passed);
        assert_eq!(
            report.test_results[0],
            TestResult {
                input: vec![json!(2), json!(3)],
                expected: "5".to_string(),
                received: "0".to_string(),
                passed: false,
            }
        );
        assert_eq!(report.summary(), "Some test cases failed.");
    }

    #[test]
    fn test_missing_lines_are_empty() {
        let job = make_job(JudgeStatus::Accepted, Some("5"));
        let report = report(evaluate(&job, &sum_cases()).unwrap());

        assert!(report.test_results[0].passed);
        assert_eq!(report.test_results[1].received, "");
        assert!(!report.test_results[1].passed);
        assert!(!report.all_passed);
    }

    #[test]
    fn test_no_stdout_at_all() {
        let job = make_job(JudgeStatus::Accepted, None);
        let report = report(evaluate(&job, &sum_cases()).unwrap());

        assert_eq!(report.test_results.len(), 2);
        assert!(report.test_results.iter().all(|r| !r.passed && r.received.is_empty()));
    }

    #[test]
    fn test_crlf_and_padding_are_trimmed() {
        let job = make_job(JudgeStatus::Accepted, Some("  5 \r\n2\r\n"));
        let report = report(evaluate(&job, &sum_cases()).unwrap());
        assert!(report.all_passed);
    }

    #[test]
    fn test_case_sensitivity() {
        let cases = vec![TestCase {
            input: vec![],
            expected_output: "True".to_string(),
        }];
        let job = make_job(JudgeStatus::Accepted, Some("true\n"));
        let report = report(evaluate(&job, &cases).unwrap());
        assert!(!report.all_passed);
    }

    #[test]
    fn test_no_float_tolerance() {
        let cases = vec![TestCase {
            input: vec![],
            expected_output: "0.3".to_string(),
        }];
        let job = make_job(JudgeStatus::Accepted, Some("0.30000000000000004\n"));
        let report = report(evaluate(&job, &cases).unwrap());
        assert!(!report.test_results[0].passed);
    }

    #[test]
    fn test_wrong_answer_status_is_still_compared() {
        let job = make_job(JudgeStatus::WrongAnswer, Some("5\n2\n"));
        assert!(report(evaluate(&job, &sum_cases()).unwrap()).all_passed);
    }

    #[test]
    fn test_compilation_error_short_circuits() {
        let job = JudgeJob {
            compile_output: Some(encode("main.cpp:1:1: error: expected ';'")),
            stdout: Some(encode("5\n2\n")),
            ..JudgeJob::pending("tok", JudgeStatus::CompilationError)
        };

        let verdict = evaluate(&job, &sum_cases()).unwrap();
        assert_eq!(
            verdict,
            Verdict::CompilationFailure {
                compile_output: "main.cpp:1:1: error: expected ';'".to_string()
            }
        );
    }

    #[test]
    fn test_runtime_error_short_circuits() {
        let job = JudgeJob {
            stderr: Some(encode("ZeroDivisionError: division by zero")),
            ..JudgeJob::pending("tok", JudgeStatus::from_id(11))
        };

        let verdict = evaluate(&job, &sum_cases()).unwrap();
        assert_eq!(
            verdict,
            Verdict::RuntimeFailure {
                status: "Runtime Error (NZEC)".to_string(),
                stderr: "ZeroDivisionError: division by zero".to_string(),
            }
        );
    }

    #[test]
    fn test_time_limit_falls_back_to_message() {
        let job = JudgeJob {
            message: Some(encode("Time limit exceeded")),
            ..JudgeJob::pending("tok", JudgeStatus::TimeLimitExceeded)
        };

        match evaluate(&job, &sum_cases()).unwrap() {
            Verdict::RuntimeFailure { status, stderr } => {
                assert_eq!(status, "Time Limit Exceeded");
                assert_eq!(stderr, "Time limit exceeded");
            }
            other => panic!("unexpected verdict {:?}", other),
        }
    }

    #[test]
    fn test_wrapped_base64_is_accepted() {
        let encoded = encode("5\n2\n");
        let wrapped = format!("{}\n{}\n", &encoded[..4], &encoded[4..]);
        let job = JudgeJob {
            stdout: Some(wrapped),
            ..JudgeJob::pending("tok", JudgeStatus::Accepted)
        };
        assert!(report(evaluate(&job, &sum_cases()).unwrap()).all_passed);
    }

    #[test]
    fn test_invalid_base64_is_an_error() {
        let job = JudgeJob {
            stdout: Some("***".to_string()),
            ..JudgeJob::pending("tok", JudgeStatus::Accepted)
        };
        assert_eq!(
            evaluate(&job, &sum_cases()),
            Err(EvaluationError::Base64 { field: "stdout" })
        );
    }

    #[test]
    fn test_non_utf8_stdout_is_a_wrong_answer() {
        let job = JudgeJob {
            stdout: Some(general_purpose::STANDARD.encode(b"5\n\xff\n")),
            ..JudgeJob::pending("tok", JudgeStatus::Accepted)
        };
        let report = report(evaluate(&job, &sum_cases()).unwrap());

        assert!(report.test_results[0].passed);
        assert_eq!(report.test_results[1].received, "\u{FFFD}");
        assert!(!report.test_results[1].passed);
        assert!(!report.all_passed);
    }

    #[test]
    fn test_non_utf8_stderr_is_kept() {
        let job = JudgeJob {
            stderr: Some(general_purpose::STANDARD.encode(b"bad \xfe byte")),
            ..JudgeJob::pending("tok", JudgeStatus::from_id(11))
        };
        match evaluate(&job, &sum_cases()).unwrap() {
            Verdict::RuntimeFailure { stderr, .. } => assert_eq!(stderr, "bad \u{FFFD} byte"),
            other => panic!("unexpected verdict {:?}", other),
        }
    }

    #[test]
    fn test_non_terminal_job_is_rejected() {
        let job = JudgeJob::pending("tok", JudgeStatus::Processing);
        assert!(matches!(
            evaluate(&job, &sum_cases()),
            Err(EvaluationError::NotTerminal { .. })
        ));
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let job = make_job(JudgeStatus::Accepted, Some("5\n3\n"));
        let first = evaluate(&job, &sum_cases()).unwrap();
        let second = evaluate(&job, &sum_cases()).unwrap();
        assert_eq!(first, second);
    }
}
