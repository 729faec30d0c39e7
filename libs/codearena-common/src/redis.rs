use crate::store::{upsert_submission, NewSubmission, ProblemStore, StoreError, SubmissionStore};
use crate::types::{Problem, StoredSubmission};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Redis key layout. Problems are imported by operators, submissions are
/// written by the API, so both sides must agree on these prefixes.

pub const PROBLEM_PREFIX: &str = "codearena:problem";
pub const SUBMISSION_PREFIX: &str = "codearena:submission";

pub fn problem_key(problem_id: &str) -> String {
    format!("{}:{}", PROBLEM_PREFIX, problem_id)
}

/// One key per (user, problem): the latest submission wins.
pub fn submission_key(user_id: &str, problem_id: &str) -> String {
    format!("{}:{}:{}", SUBMISSION_PREFIX, user_id, problem_id)
}

/// Problem and submission store backed by Redis JSON documents.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Writes a problem document, replacing any existing one.
    pub async fn put_problem(&self, problem: &Problem) -> Result<(), StoreError> {
        let payload = serde_json::to_string(problem)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set(problem_key(&problem.id), payload).await?;
        Ok(())
    }
}

#[async_trait]
impl ProblemStore for RedisStore {
    async fn get_problem(&self, id: &str) -> Result<Option<Problem>, StoreError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(problem_key(id)).await?;

        match payload {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SubmissionStore for RedisStore {
    async fn save_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<StoredSubmission, StoreError> {
        let key = submission_key(&submission.user_id, &submission.problem_id);
        let mut conn = self.conn.clone();

        let mut previous = self
            .latest_submission(&submission.user_id, &submission.problem_id)
            .await?;

        // First write for (user, problem): only one concurrent writer may mint the id.
        if previous.is_none() {
            let created = upsert_submission(None, submission.clone());
            let payload = serde_json::to_string(&created)?;
            let inserted: bool = conn.set_nx(&key, payload).await?;
            if inserted {
                return Ok(created);
            }
            previous = self
                .latest_submission(&submission.user_id, &submission.problem_id)
                .await?;
        }

        let stored = upsert_submission(previous, submission);
        let payload = serde_json::to_string(&stored)?;
        let _: () = conn.set(&key, payload).await?;

        Ok(stored)
    }

    async fn latest_submission(
        &self,
        user_id: &str,
        problem_id: &str,
    ) -> Result<Option<StoredSubmission>, StoreError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(submission_key(user_id, problem_id)).await?;

        match payload {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }
}
