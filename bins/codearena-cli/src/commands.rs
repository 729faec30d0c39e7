// CLI commands for working with CodeArena problems
use anyhow::{bail, Context, Result};
use codearena_api::auth;
use codearena_common::config::JudgeConfig;
use codearena_common::redis::RedisStore;
use codearena_common::store::{load_problems_file, InMemoryStore};
use codearena_common::types::{Language, Problem, SubmissionRequest, Verdict};
use codearena_judge::{HarnessRegistry, Judge0Client, PollPolicy, SubmissionPipeline};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Parse a problems file without stopping at the first invalid entry
fn read_problems_unchecked(path: &Path) -> Result<Vec<Problem>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn find_problem(path: &Path, problem_id: &str) -> Result<Problem> {
    load_problems_file(path)?
        .into_iter()
        .find(|p| p.id == problem_id)
        .with_context(|| format!("Problem '{}' not found in {}", problem_id, path.display()))
}

/// Pick the Judge0 id the problem lists for a language name.
fn language_id_for(problem: &Problem, language: Language) -> Option<u32> {
    problem
        .supported_languages
        .iter()
        .find(|sl| Language::from_name(&sl.name) == Some(language))
        .map(|sl| sl.language_id)
}

/// Explicit id first, then the problem's own entry, then the usual Judge0 id.
fn resolve_language_id(problem: &Problem, language: Language, explicit: Option<u32>) -> u32 {
    explicit
        .or_else(|| language_id_for(problem, language))
        .unwrap_or_else(|| language.default_judge_id())
}

/// Validate every problem in a problems file
pub fn check_problems(path: &Path) -> Result<()> {
    println!("🔍 Checking problems in {}", path.display());

    let problems = read_problems_unchecked(path)?;
    let mut invalid = 0;

    for problem in &problems {
        match problem.validate() {
            Ok(()) => println!(
                "  ✅ {} ({} test cases, {} languages)",
                problem.id,
                problem.test_cases.len(),
                problem.supported_languages.len()
            ),
            Err(errors) => {
                invalid += 1;
                println!("  ❌ {}", problem.id);
                for error in errors {
                    println!("     - {}", error);
                }
            }
        }
    }

    if invalid > 0 {
        bail!("{} of {} problems are invalid", invalid, problems.len());
    }

    println!("✨ All {} problems are valid", problems.len());
    Ok(())
}

/// Print the harness appended to user code for a problem
pub fn print_harness(problems_path: &Path, problem_id: &str, language_name: &str) -> Result<()> {
    let problem = find_problem(problems_path, problem_id)?;
    let harness = HarnessRegistry::default()
        .build_harness(language_name, &problem.function_name, &problem.test_cases)
        .with_context(|| format!("Failed to build {} harness", language_name))?;

    println!("{}", harness);
    Ok(())
}

/// Run a source file through the full pipeline against the configured Judge0
pub async fn run_submission(
    problems_path: &Path,
    problem_id: &str,
    language_name: &str,
    language_id: Option<u32>,
    code_path: &Path,
) -> Result<()> {
    let problem = find_problem(problems_path, problem_id)?;
    let code = fs::read_to_string(code_path)
        .with_context(|| format!("Failed to read {}", code_path.display()))?;

    let language = Language::from_name(language_name)
        .with_context(|| format!("Unknown language '{}'", language_name))?;
    let language_id = resolve_language_id(&problem, language, language_id);

    let judge_config = JudgeConfig::from_env()?;
    let judge = Judge0Client::new(&judge_config)?;
    println!(
        "🚀 Running {} on '{}' via {} (language id {})",
        code_path.display(),
        problem_id,
        judge.base_url(),
        language_id
    );

    let store = Arc::new(InMemoryStore::with_problems(vec![problem]));
    let pipeline = SubmissionPipeline::new(store, Arc::new(judge), PollPolicy::from(&judge_config));

    let request = SubmissionRequest {
        code: Some(code),
        language_id: Some(language_id),
        language_name: Some(language_name.to_string()),
        problem_id: Some(problem_id.to_string()),
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let verdict = pipeline.run(request, &cancel).await?;
    print_verdict(&verdict);

    match &verdict {
        Verdict::Evaluated(report) if report.all_passed => Ok(()),
        _ => bail!("{}", verdict_failure(&verdict)),
    }
}

fn verdict_failure(verdict: &Verdict) -> &'static str {
    match verdict {
        Verdict::Evaluated(_) => "Some test cases failed",
        Verdict::CompilationFailure { .. } => "Compilation failed",
        Verdict::RuntimeFailure { .. } => "Runtime error",
    }
}

fn print_verdict(verdict: &Verdict) {
    match verdict {
        Verdict::Evaluated(report) => {
            for (i, result) in report.test_results.iter().enumerate() {
                let mark = if result.passed { "✅" } else { "❌" };
                println!(
                    "  {} #{} expected {:?}, received {:?}",
                    mark,
                    i + 1,
                    result.expected,
                    result.received
                );
            }
        }
        Verdict::CompilationFailure { compile_output } => {
            println!("🛑 Compilation error:\n{}", compile_output);
        }
        Verdict::RuntimeFailure { status, stderr } => {
            println!("💥 {}:\n{}", status, stderr);
        }
    }
    println!("{}", verdict.summary());
}

/// Print a signed access token for calling the API by hand
pub fn issue_token(user_id: &str, ttl_minutes: i64) -> Result<()> {
    if user_id.trim().is_empty() {
        bail!("User id cannot be empty");
    }
    if ttl_minutes <= 0 {
        bail!("Token lifetime must be positive");
    }
    let secret = std::env::var("ACCESS_TOKEN_SECRET")
        .ok()
        .filter(|s| !s.is_empty())
        .context("ACCESS_TOKEN_SECRET is not set")?;

    println!("{}", sign_token(&secret, user_id, ttl_minutes)?);
    Ok(())
}

fn sign_token(secret: &str, user_id: &str, ttl_minutes: i64) -> Result<String> {
    auth::issue_token(secret, user_id, chrono::Duration::minutes(ttl_minutes))
        .context("Failed to sign token")
}

/// Load a problems file into Redis
pub async fn import_problems(problems_path: &Path, redis_url: Option<&str>) -> Result<()> {
    let redis_url = match redis_url {
        Some(url) => url.to_string(),
        None => std::env::var("REDIS_URL").context("No --redis-url given and REDIS_URL is not set")?,
    };

    let problems = load_problems_file(problems_path)?;
    println!("📦 Importing {} problems into {}", problems.len(), redis_url);

    let store = RedisStore::connect(&redis_url)
        .await
        .context("Failed to connect to Redis")?;
    for problem in &problems {
        store.put_problem(problem).await?;
        println!("  ✅ {}", problem.id);
    }

    println!("✨ Import complete");
    Ok(())
}
