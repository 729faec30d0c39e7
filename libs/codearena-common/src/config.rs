// Environment-driven configuration shared by the API and the CLI

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_JUDGE_URL: &str = "https://judge0-ce.p.rapidapi.com/submissions";

/// Judge0 asks clients not to poll faster than this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be set")]
    Missing { name: &'static str },
    #[error("{name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Endpoint, credentials and timing for the external judge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgeConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_host: Option<String>,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_JUDGE_URL.to_string(),
            api_key: None,
            api_host: None,
            poll_interval: MIN_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl JudgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let poll_interval = match parse_var::<u64>("JUDGE_POLL_INTERVAL_MS")? {
            Some(ms) => Duration::from_millis(ms),
            None => defaults.poll_interval,
        };

        Ok(Self {
            base_url: non_empty_var("JUDGE0_API_URL").unwrap_or(defaults.base_url),
            api_key: non_empty_var("JUDGE0_API_KEY"),
            api_host: non_empty_var("JUDGE0_API_HOST"),
            poll_interval,
            poll_timeout: parse_var::<u64>("JUDGE_POLL_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_timeout),
            request_timeout: parse_var::<u64>("JUDGE_REQUEST_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
        .clamped())
    }

    /// Raises the poll interval to the courtesy floor.
    pub fn clamped(mut self) -> Self {
        if self.poll_interval < MIN_POLL_INTERVAL {
            warn!(
                requested_ms = self.poll_interval.as_millis() as u64,
                "Poll interval below 1s, clamping"
            );
            self.poll_interval = MIN_POLL_INTERVAL;
        }
        self
    }
}

/// Settings of the HTTP service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub redis_url: Option<String>,
    pub problems_file: Option<PathBuf>,
    pub access_token_secret: String,
    pub judge: JudgeConfig,
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            bind_addr: non_empty_var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string()),
            redis_url: non_empty_var("REDIS_URL"),
            problems_file: non_empty_var("PROBLEMS_FILE").map(PathBuf::from),
            access_token_secret: non_empty_var("ACCESS_TOKEN_SECRET").ok_or(
                ConfigError::Missing {
                    name: "ACCESS_TOKEN_SECRET",
                },
            )?,
            judge: JudgeConfig::from_env()?,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match non_empty_var(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
