/// Judge Client - remote execution over the Judge0 HTTP protocol
///
/// **Core Responsibility:**
/// Hand assembled source to the external judge, then poll the job until it
/// reaches a terminal status or the time budget runs out.
///
/// **Protocol:**
/// - `POST {base}?base64_encoded=true&wait=false` with `{language_id, source_code}`
///   returns `{token}` immediately
/// - `GET {base}/{token}?base64_encoded=true&fields=*` returns the job state;
///   `stdout`, `stderr` and `compile_output` are base64 when present
///
/// **State machine:**
/// `Submitted -> {Queued, Processing}* -> terminal`. Status ids below 3 are
/// non-terminal, everything from 3 upwards is terminal. The poller stops at
/// the first terminal status it sees.
///
/// **Bounds:**
/// - total polling is capped by `PollPolicy::timeout`
/// - every HTTP round-trip is capped by the client's request timeout
/// - polls are spaced by at least one second

use crate::error::SubmissionError;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use codearena_common::config::{JudgeConfig, MIN_POLL_INTERVAL};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// First status id after which a job no longer changes.
pub const FIRST_TERMINAL_STATUS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeErrorKind {
    Sigsegv,
    Sigxfsz,
    Sigfpe,
    Sigabrt,
    Nzec,
    Other,
}

/// Judge0 execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JudgeStatus {
    Queued,
    Processing,
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    CompilationError,
    RuntimeError(RuntimeErrorKind),
    InternalError,
    ExecFormatError,
    Unknown(u32),
}

impl JudgeStatus {
    pub fn from_id(id: u32) -> Self {
        match id {
            1 => JudgeStatus::Queued,
            2 => JudgeStatus::Processing,
            3 => JudgeStatus::Accepted,
            4 => JudgeStatus::WrongAnswer,
            5 => JudgeStatus::TimeLimitExceeded,
            6 => JudgeStatus::CompilationError,
            7 => JudgeStatus::RuntimeError(RuntimeErrorKind::Sigsegv),
            8 => JudgeStatus::RuntimeError(RuntimeErrorKind::Sigxfsz),
            9 => JudgeStatus::RuntimeError(RuntimeErrorKind::Sigfpe),
            10 => JudgeStatus::RuntimeError(RuntimeErrorKind::Sigabrt),
            11 => JudgeStatus::RuntimeError(RuntimeErrorKind::Nzec),
            12 => JudgeStatus::RuntimeError(RuntimeErrorKind::Other),
            13 => JudgeStatus::InternalError,
            14 => JudgeStatus::ExecFormatError,
            other => JudgeStatus::Unknown(other),
        }
    }

    pub fn id(&self) -> u32 {
        match self {
            JudgeStatus::Queued => 1,
            JudgeStatus::Processing => 2,
            JudgeStatus::Accepted => 3,
            JudgeStatus::WrongAnswer => 4,
            JudgeStatus::TimeLimitExceeded => 5,
            JudgeStatus::CompilationError => 6,
            JudgeStatus::RuntimeError(RuntimeErrorKind::Sigsegv) => 7,
            JudgeStatus::RuntimeError(RuntimeErrorKind::Sigxfsz) => 8,
            JudgeStatus::RuntimeError(RuntimeErrorKind::Sigfpe) => 9,
            JudgeStatus::RuntimeError(RuntimeErrorKind::Sigabrt) => 10,
            JudgeStatus::RuntimeError(RuntimeErrorKind::Nzec) => 11,
            JudgeStatus::RuntimeError(RuntimeErrorKind::Other) => 12,
            JudgeStatus::InternalError => 13,
            JudgeStatus::ExecFormatError => 14,
            JudgeStatus::Unknown(id) => *id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.id() >= FIRST_TERMINAL_STATUS
    }

    /// Description Judge0 uses for this status.
    pub fn default_description(&self) -> &'static str {
        match self {
            JudgeStatus::Queued => "In Queue",
            JudgeStatus::Processing => "Processing",
            JudgeStatus::Accepted => "Accepted",
            JudgeStatus::WrongAnswer => "Wrong Answer",
            JudgeStatus::TimeLimitExceeded => "Time Limit Exceeded",
            JudgeStatus::CompilationError => "Compilation Error",
            JudgeStatus::RuntimeError(RuntimeErrorKind::Sigsegv) => "Runtime Error (SIGSEGV)",
            JudgeStatus::RuntimeError(RuntimeErrorKind::Sigxfsz) => "Runtime Error (SIGXFSZ)",
            JudgeStatus::RuntimeError(RuntimeErrorKind::Sigfpe) => "Runtime Error (SIGFPE)",
            JudgeStatus::RuntimeError(RuntimeErrorKind::Sigabrt) => "Runtime Error (SIGABRT)",
            JudgeStatus::RuntimeError(RuntimeErrorKind::Nzec) => "Runtime Error (NZEC)",
            JudgeStatus::RuntimeError(RuntimeErrorKind::Other) => "Runtime Error (Other)",
            JudgeStatus::InternalError => "Internal Error",
            JudgeStatus::ExecFormatError => "Exec Format Error",
            JudgeStatus::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for JudgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.default_description(), self.id())
    }
}

/// One remote execution as last observed. Output fields stay base64 encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeJob {
    pub token: String,
    pub status: JudgeStatus,
    pub description: String,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub compile_output: Option<String>,
    pub message: Option<String>,
    pub time: Option<String>,
    pub memory: Option<u64>,
}

impl JudgeJob {
    /// A job with no output, as the judge reports it while still running.
    pub fn pending(token: impl Into<String>, status: JudgeStatus) -> Self {
        Self {
            token: token.into(),
            status,
            description: status.default_description().to_string(),
            stdout: None,
            stderr: None,
            compile_output: None,
            message: None,
            time: None,
            memory: None,
        }
    }
}

/// Remote judge seam. The HTTP client implements it; tests script it.
#[async_trait]
pub trait Judge: Send + Sync {
    /// Submit source without waiting; returns the job token.
    async fn submit(&self, source: &str, language_id: u32) -> Result<String, SubmissionError>;

    /// Read the current state of a job once.
    async fn fetch(&self, token: &str) -> Result<JudgeJob, SubmissionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl From<&JudgeConfig> for PollPolicy {
    fn from(config: &JudgeConfig) -> Self {
        Self {
            interval: config.poll_interval,
            timeout: config.poll_timeout,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy::from(&JudgeConfig::default())
    }
}

/// Poll `token` until it is terminal, the budget is spent, or `cancel` fires.
/// Intervals under `MIN_POLL_INTERVAL` are raised to it.
#[instrument(skip(judge, cancel), fields(interval_ms = policy.interval.as_millis() as u64))]
pub async fn poll<J: Judge + ?Sized>(
    judge: &J,
    token: &str,
    policy: PollPolicy,
    cancel: &CancellationToken,
) -> Result<JudgeJob, SubmissionError> {
    let interval = policy.interval.max(MIN_POLL_INTERVAL);
    let polling = async {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let job = judge.fetch(token).await?;
            if job.status.is_terminal() {
                debug!(attempts, status = %job.status, "Judge job finished");
                return Ok::<_, SubmissionError>(job);
            }
            debug!(attempts, status = %job.status, "Judge job still running");
            tokio::time::sleep(interval).await;
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            info!("Polling cancelled");
            Err(SubmissionError::Cancelled)
        }
        outcome = tokio::time::timeout(policy.timeout, polling) => {
            outcome.unwrap_or_else(|_| {
                warn!(budget_secs = policy.timeout.as_secs(), "Judge did not finish in time");
                Err(SubmissionError::ExecutionTimeout(policy.timeout))
            })
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("invalid value for header {0}")]
    InvalidHeader(&'static str),
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct CreateSubmission {
    language_id: u32,
    source_code: String,
}

#[derive(Deserialize)]
struct CreatedSubmission {
    token: String,
}

#[derive(Deserialize)]
struct StatusBody {
    id: u32,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct SubmissionDetails {
    status: StatusBody,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    compile_output: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    memory: Option<u64>,
}

/// Judge0 client. Endpoint and credentials come from `JudgeConfig`.
#[derive(Clone)]
pub struct Judge0Client {
    http: reqwest::Client,
    base_url: String,
}

impl Judge0Client {
    pub fn new(config: &JudgeConfig) -> Result<Self, ClientBuildError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|_| ClientBuildError::InvalidHeader("x-rapidapi-key"))?;
            headers.insert("x-rapidapi-key", value);
        }
        if let Some(host) = &config.api_host {
            let value = HeaderValue::from_str(host)
                .map_err(|_| ClientBuildError::InvalidHeader("x-rapidapi-host"))?;
            headers.insert("x-rapidapi-host", value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Judge for Judge0Client {
    async fn submit(&self, source: &str, language_id: u32) -> Result<String, SubmissionError> {
        let body = CreateSubmission {
            language_id,
            source_code: general_purpose::STANDARD.encode(source),
        };

        let response = self
            .http
            .post(&self.base_url)
            .query(&[("base64_encoded", "true"), ("wait", "false")])
            .json(&body)
            .send()
            .await
            .map_err(|e| SubmissionError::Dispatch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubmissionError::Dispatch(format!(
                "judge responded with {}",
                status
            )));
        }

        let created: CreatedSubmission = response
            .json()
            .await
            .map_err(|e| SubmissionError::Dispatch(format!("malformed response: {}", e)))?;

        debug!(token = %created.token, language_id, "Submitted to judge");
        Ok(created.token)
    }

    async fn fetch(&self, token: &str) -> Result<JudgeJob, SubmissionError> {
        let url = format!("{}/{}", self.base_url, token);
        let response = self
            .http
            .get(&url)
            .query(&[("base64_encoded", "true"), ("fields", "*")])
            .send()
            .await
            .map_err(|e| SubmissionError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubmissionError::Fetch(format!(
                "judge responded with {}",
                status
            )));
        }

        let details: SubmissionDetails = response
            .json()
            .await
            .map_err(|e| SubmissionError::Fetch(format!("malformed response: {}", e)))?;

        let judge_status = JudgeStatus::from_id(details.status.id);
        Ok(JudgeJob {
            token: token.to_string(),
            status: judge_status,
            description: details
                .status
                .description
                .unwrap_or_else(|| judge_status.default_description().to_string()),
            stdout: details.stdout,
            stderr: details.stderr,
            compile_output: details.compile_output,
            message: details.message,
            time: details.time,
            memory: details.memory,
        })
    }
}
