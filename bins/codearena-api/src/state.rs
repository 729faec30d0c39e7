use codearena_common::store::SubmissionStore;
use codearena_judge::SubmissionPipeline;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared, read-only service state. Nothing in here is mutated per request.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: SubmissionPipeline,
    pub submissions: Arc<dyn SubmissionStore>,
    pub access_token_secret: String,
    /// Cancelled on shutdown; every request polls under a child of it.
    pub shutdown: CancellationToken,
}
