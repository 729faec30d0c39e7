use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use codearena_common::store::InMemoryStore;
use codearena_common::types::{
    Problem, SubmissionRequest, SupportedLanguage, TestCase, Verdict,
};
use codearena_common::types::Language;
use codearena_judge::harness::python_harness;
use codearena_judge::{
    HarnessRegistry, Judge, JudgeJob, JudgeStatus, PollPolicy, SubmissionError, SubmissionPipeline,
};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fake judge: reports Processing for `busy_polls` fetches, then the final job.
struct FakeJudge {
    busy_polls: u32,
    final_status: u32,
    stdout: Option<String>,
    compile_output: Option<String>,
    /// Fail the fetch that would have returned the final job.
    drop_connection: bool,
    submits: AtomicU32,
    fetches: AtomicU32,
    submitted: Mutex<Vec<(String, u32)>>,
}

impl FakeJudge {
    fn finishing(status: u32, stdout: Option<&str>) -> Self {
        Self {
            busy_polls: 2,
            final_status: status,
            stdout: stdout.map(|s| general_purpose::STANDARD.encode(s)),
            compile_output: None,
            drop_connection: false,
            submits: AtomicU32::new(0),
            fetches: AtomicU32::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    fn never_finishing() -> Self {
        Self {
            busy_polls: u32::MAX,
            ..Self::finishing(3, None)
        }
    }

    fn submits(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Judge for FakeJudge {
    async fn submit(&self, source: &str, language_id: u32) -> Result<String, SubmissionError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.submitted
            .lock()
            .unwrap()
            .push((source.to_string(), language_id));
        Ok("d85cd024-1548-4165-96c7-7bc88673f194".to_string())
    }

    async fn fetch(&self, token: &str) -> Result<JudgeJob, SubmissionError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst);
        if n < self.busy_polls {
            return Ok(JudgeJob::pending(token, JudgeStatus::Processing));
        }
        if self.drop_connection {
            return Err(SubmissionError::Fetch("connection reset by peer".to_string()));
        }
        Ok(JudgeJob {
            stdout: self.stdout.clone(),
            compile_output: self.compile_output.clone(),
            ..JudgeJob::pending(token, JudgeStatus::from_id(self.final_status))
        })
    }
}

fn sum_problem() -> Problem {
    Problem {
        id: "sum".to_string(),
        title: Some("Sum of two numbers".to_string()),
        function_name: "add".to_string(),
        test_cases: vec![
            TestCase {
                input: vec![json!(2), json!(3)],
                expected_output: "5".to_string(),
            },
            TestCase {
                input: vec![json!(1), json!(1)],
                expected_output: "2".to_string(),
            },
        ],
        supported_languages: vec![
            SupportedLanguage {
                name: "Python 3".to_string(),
                language_id: 71,
            },
            SupportedLanguage {
                name: "C++".to_string(),
                language_id: 54,
            },
        ],
    }
}

fn pipeline_with(judge: Arc<FakeJudge>, problems: Vec<Problem>) -> SubmissionPipeline {
    let store = Arc::new(InMemoryStore::with_problems(problems));
    SubmissionPipeline::new(store, judge, PollPolicy::default())
}

fn request(code: &str, language_id: u32, language_name: &str) -> SubmissionRequest {
    SubmissionRequest {
        code: Some(code.to_string()),
        language_id: Some(language_id),
        language_name: Some(language_name.to_string()),
        problem_id: Some("sum".to_string()),
    }
}

const SUM_CODE: &str = "def add(a, b):\n    return a + b";

#[tokio::test(start_paused = true)]
async fn scenario_a_correct_solution_passes_every_case() {
    let judge = Arc::new(FakeJudge::finishing(3, Some("5\n2\n")));
    let pipeline = pipeline_with(judge.clone(), vec![sum_problem()]);

    let verdict = pipeline
        .run(request(SUM_CODE, 71, "python"), &CancellationToken::new())
        .await
        .unwrap();

    let Verdict::Evaluated(report) = verdict else {
        panic!("expected evaluated verdict");
    };
    assert!(report.all_passed);
    assert_eq!(report.test_results.len(), 2);
    assert!(report.test_results.iter().all(|r| r.passed));

    let submitted = judge.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    let (source, language_id) = &submitted[0];
    assert_eq!(*language_id, 71);
    assert!(source.starts_with(SUM_CODE));
    assert!(source.ends_with("print(add(2, 3))\nprint(add(1, 1))\n"));
    assert_eq!(judge.fetches.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn scenario_b_constant_answer_fails() {
    let judge = Arc::new(FakeJudge::finishing(3, Some("0\n0\n")));
    let pipeline = pipeline_with(judge, vec![sum_problem()]);

    let verdict = pipeline
        .run(
            request("def add(a, b):\n    return 0", 71, "python"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let Verdict::Evaluated(report) = verdict else {
        panic!("expected evaluated verdict");
    };
    assert!(!report.all_passed);
    assert_eq!(report.test_results[0].expected, "5");
    assert_eq!(report.test_results[0].received, "0");
    assert!(!report.test_results[0].passed);
}

#[tokio::test(start_paused = true)]
async fn scenario_c_compile_error_has_no_test_results() {
    let judge = Arc::new(FakeJudge {
        compile_output: Some(general_purpose::STANDARD.encode("error: 'ad' was not declared")),
        ..FakeJudge::finishing(6, None)
    });
    let pipeline = pipeline_with(judge, vec![sum_problem()]);

    let verdict = pipeline
        .run(request("int ad(int a, int b) { return a + b; }", 54, "cpp"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        verdict,
        Verdict::CompilationFailure {
            compile_output: "error: 'ad' was not declared".to_string()
        }
    );
}

#[tokio::test]
async fn scenario_d_unknown_language_name_never_reaches_judge() {
    let judge = Arc::new(FakeJudge::finishing(3, Some("5\n2\n")));
    let pipeline = pipeline_with(judge.clone(), vec![sum_problem()]);

    let err = pipeline
        .run(request(SUM_CODE, 71, "cobol"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::UnsupportedLanguage(ref name) if name == "cobol"));
    assert_eq!(judge.submits(), 0);
}

#[tokio::test]
async fn unsupported_language_id_is_rejected_before_dispatch() {
    let judge = Arc::new(FakeJudge::finishing(3, Some("5\n2\n")));
    let pipeline = pipeline_with(judge.clone(), vec![sum_problem()]);

    let err = pipeline
        .run(request(SUM_CODE, 93, "javascript"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SubmissionError::UnsupportedLanguageForProblem { language_id: 93 }
    ));
    assert_eq!(judge.submits(), 0);
    assert_eq!(judge.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn mismatched_language_name_is_a_validation_error() {
    let judge = Arc::new(FakeJudge::finishing(3, None));
    let pipeline = pipeline_with(judge.clone(), vec![sum_problem()]);

    let err = pipeline
        .run(request(SUM_CODE, 54, "python"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.field_errors().len(), 1);
    assert_eq!(err.field_errors()[0].field, "languageName");
    assert_eq!(judge.submits(), 0);
}

#[tokio::test]
async fn missing_fields_are_reported_together() {
    let judge = Arc::new(FakeJudge::finishing(3, None));
    let pipeline = pipeline_with(judge.clone(), vec![sum_problem()]);

    let err = pipeline
        .run(
            SubmissionRequest {
                code: Some(SUM_CODE.to_string()),
                ..SubmissionRequest::default()
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    let fields: Vec<_> = err.field_errors().iter().map(|e| e.field.clone()).collect();
    assert_eq!(fields, vec!["language_id", "languageName", "problemId"]);
    assert_eq!(judge.submits(), 0);
}

#[tokio::test]
async fn unknown_problem_is_not_found() {
    let judge = Arc::new(FakeJudge::finishing(3, None));
    let pipeline = pipeline_with(judge.clone(), vec![]);

    let err = pipeline
        .run(request(SUM_CODE, 71, "python"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::ProblemNotFound(ref id) if id == "sum"));
}

#[tokio::test]
async fn problem_without_function_name_is_misconfigured() {
    let judge = Arc::new(FakeJudge::finishing(3, None));
    let problem = Problem {
        function_name: "  ".to_string(),
        ..sum_problem()
    };
    let pipeline = pipeline_with(judge.clone(), vec![problem]);

    let err = pipeline
        .run(request(SUM_CODE, 71, "python"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::Configuration(_)));
    assert_eq!(judge.submits(), 0);
}

#[tokio::test(start_paused = true)]
async fn stuck_judge_times_out() {
    let judge = Arc::new(FakeJudge::never_finishing());
    let pipeline = pipeline_with(judge.clone(), vec![sum_problem()]);

    let err = pipeline
        .run(request(SUM_CODE, 71, "python"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::ExecutionTimeout(d) if d == Duration::from_secs(15)));
    assert_eq!(judge.submits(), 1);
}

#[tokio::test]
async fn cancelled_request_is_not_dispatched() {
    let judge = Arc::new(FakeJudge::finishing(3, None));
    let pipeline = pipeline_with(judge.clone(), vec![sum_problem()]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = pipeline
        .run(request(SUM_CODE, 71, "python"), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::Cancelled));
    assert_eq!(judge.submits(), 0);
}

#[tokio::test(start_paused = true)]
async fn runtime_error_is_a_runtime_failure() {
    let judge = Arc::new(FakeJudge {
        stdout: None,
        ..FakeJudge::finishing(7, None)
    });
    let pipeline = pipeline_with(judge, vec![sum_problem()]);

    let verdict = pipeline
        .run(request(SUM_CODE, 71, "python"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(
        verdict,
        Verdict::RuntimeFailure { ref status, .. } if status == "Runtime Error (SIGSEGV)"
    ));
}

#[tokio::test(start_paused = true)]
async fn judge_lost_mid_poll_stops_with_fetch_error() {
    let judge = Arc::new(FakeJudge {
        drop_connection: true,
        ..FakeJudge::finishing(3, Some("5\n2\n"))
    });
    let pipeline = pipeline_with(judge.clone(), vec![sum_problem()]);

    let started = tokio::time::Instant::now();
    let err = pipeline
        .run(request(SUM_CODE, 71, "python"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::Fetch(_)));
    assert_eq!(judge.fetches.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn custom_registry_limits_languages() {
    let judge = Arc::new(FakeJudge::finishing(3, Some("5\n2\n")));
    let mut harnesses = HarnessRegistry::empty();
    harnesses.register(Language::Python, python_harness);
    let pipeline = pipeline_with(judge.clone(), vec![sum_problem()]).with_harnesses(harnesses);

    let err = pipeline
        .run(request("int add(int a, int b) { return a + b; }", 54, "cpp"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::UnsupportedLanguage(ref name) if name == "cpp"));
    assert_eq!(judge.submits(), 0);
}
