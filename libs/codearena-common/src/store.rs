// Storage seams for problems and submissions.
// The submission pipeline only reads problems; submissions are recorded by the surrounding service.

use crate::types::{Problem, StoredSubmission};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("malformed document: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid problem '{id}': {reason}")]
    InvalidProblem { id: String, reason: String },
}

#[async_trait]
pub trait ProblemStore: Send + Sync {
    async fn get_problem(&self, id: &str) -> Result<Option<Problem>, StoreError>;
}

/// What the caller sends to record a submission.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub user_id: String,
    pub problem_id: String,
    pub language_id: u32,
    pub code: String,
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Records the latest code for (user, problem), replacing any earlier one.
    async fn save_submission(&self, submission: NewSubmission)
        -> Result<StoredSubmission, StoreError>;

    async fn latest_submission(
        &self,
        user_id: &str,
        problem_id: &str,
    ) -> Result<Option<StoredSubmission>, StoreError>;
}

/// Builds the stored form of a submission, keeping identity and creation time of `previous`.
pub fn upsert_submission(
    previous: Option<StoredSubmission>,
    submission: NewSubmission,
) -> StoredSubmission {
    let now = Utc::now();
    match previous {
        Some(mut existing) => {
            existing.language_id = submission.language_id;
            existing.code = submission.code;
            existing.updated_at = now;
            existing
        }
        None => StoredSubmission {
            id: Uuid::new_v4(),
            user_id: submission.user_id,
            problem_id: submission.problem_id,
            language_id: submission.language_id,
            code: submission.code,
            created_at: now,
            updated_at: now,
        },
    }
}

/// Process-local store, used when no Redis is configured and in tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    problems: RwLock<HashMap<String, Problem>>,
    submissions: RwLock<HashMap<(String, String), StoredSubmission>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_problems(problems: impl IntoIterator<Item = Problem>) -> Self {
        let problems = problems.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self {
            problems: RwLock::new(problems),
            submissions: RwLock::default(),
        }
    }

    pub async fn problem_count(&self) -> usize {
        self.problems.read().await.len()
    }
}

#[async_trait]
impl ProblemStore for InMemoryStore {
    async fn get_problem(&self, id: &str) -> Result<Option<Problem>, StoreError> {
        Ok(self.problems.read().await.get(id).cloned())
    }
}

#[async_trait]
impl SubmissionStore for InMemoryStore {
    async fn save_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<StoredSubmission, StoreError> {
        let key = (submission.user_id.clone(), submission.problem_id.clone());
        let mut submissions = self.submissions.write().await;
        let stored = upsert_submission(submissions.remove(&key), submission);
        submissions.insert(key, stored.clone());
        Ok(stored)
    }

    async fn latest_submission(
        &self,
        user_id: &str,
        problem_id: &str,
    ) -> Result<Option<StoredSubmission>, StoreError> {
        let key = (user_id.to_string(), problem_id.to_string());
        Ok(self.submissions.read().await.get(&key).cloned())
    }
}

/// Reads a JSON array of problems and checks each one is runnable.
pub fn load_problems_file(path: &Path) -> Result<Vec<Problem>, StoreError> {
    let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_problems(&content)
}

pub fn parse_problems(content: &str) -> Result<Vec<Problem>, StoreError> {
    let problems: Vec<Problem> = serde_json::from_str(content)?;
    for problem in &problems {
        problem
            .validate()
            .map_err(|errors| StoreError::InvalidProblem {
                id: problem.id.clone(),
                reason: errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            })?;
    }
    Ok(problems)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_submission(code: &str, language_id: u32) -> NewSubmission {
        NewSubmission {
            user_id: "u1".to_string(),
            problem_id: "p1".to_string(),
            language_id,
            code: code.to_string(),
        }
    }

    #[tokio::test]
    async fn test_save_submission_overwrites_previous() {
        let store = InMemoryStore::new();

        let first = store.save_submission(new_submission("v1", 71)).await.unwrap();
        let second = store.save_submission(new_submission("v2", 54)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.code, "v2");
        assert_eq!(second.language_id, 54);

        let latest = store.latest_submission("u1", "p1").await.unwrap().unwrap();
        assert_eq!(latest, second);
        assert!(store.latest_submission("u2", "p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_problem_lookup() {
        let problems = parse_problems(
            r#"[{
                "id": "sum",
                "functionName": "add",
                "testCases": [
                    {"input": [1, 2], "expectedOutput": "3"},
                    {"input": [2, 3], "expectedOutput": "5"},
                    {"input": [0, 0], "expectedOutput": "0"}
                ],
                "supportedLanguages": [{"name": "Python 3", "language_id": 71}]
            }]"#,
        )
        .unwrap();
        let store = InMemoryStore::with_problems(problems);

        assert_eq!(store.problem_count().await, 1);
        assert!(store.get_problem("sum").await.unwrap().is_some());
        assert!(store.get_problem("missing").await.unwrap().is_none());
    }

    #[test]
    fn test_parse_rejects_unrunnable_problem() {
        let err = parse_problems(
            r#"[{"id": "tiny", "functionName": "f", "testCases": [],
                 "supportedLanguages": [{"name": "js", "language_id": 93}]}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::InvalidProblem { ref id, .. } if id == "tiny"));
    }
}
