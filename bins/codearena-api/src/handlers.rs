// HTTP route handlers for the CodeArena API

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use codearena_common::store::NewSubmission;
use codearena_common::types::{SubmissionRequest, Verdict};
use codearena_judge::SubmissionError;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::metrics;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub message: String,
    #[serde(flatten)]
    pub verdict: Verdict,
}

/// POST /submission/run - Judge code against the problem's hidden test cases
pub async fn run_submission(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<SubmissionRequest>, JsonRejection>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let Json(request) = payload?;
    let start = Instant::now();

    // Polling stops as soon as this request is dropped or the server shuts down.
    let cancel = state.shutdown.child_token();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let record = request.clone();
    let result = state.pipeline.run(request, &cancel).await;

    match result {
        Ok(verdict) => {
            metrics::record_submission(verdict.label(), start.elapsed());
            info!(
                user_id = %user.user_id,
                verdict = verdict.label(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Submission completed"
            );

            save_submission(&state, &user, record).await;

            Ok(Json(SubmissionResponse {
                message: verdict.summary().to_string(),
                verdict,
            }))
        }
        Err(e) => {
            metrics::record_submission(e.kind(), start.elapsed());
            if is_server_side(&e) {
                error!(user_id = %user.user_id, error = %e, "Submission failed");
            } else {
                info!(user_id = %user.user_id, error = %e, "Submission rejected");
            }
            Err(ApiError::from(e))
        }
    }
}

fn is_server_side(err: &SubmissionError) -> bool {
    matches!(
        err,
        SubmissionError::Dispatch(_)
            | SubmissionError::Fetch(_)
            | SubmissionError::ExecutionTimeout(_)
            | SubmissionError::Protocol(_)
            | SubmissionError::Store(_)
            | SubmissionError::Configuration(_)
    )
}

/// Keeps the user's latest code for the problem. A store failure does not fail the run.
async fn save_submission(state: &AppState, user: &AuthUser, request: SubmissionRequest) {
    let (Some(code), Some(problem_id), Some(language_id)) =
        (request.code, request.problem_id, request.language_id)
    else {
        return;
    };

    let submission = NewSubmission {
        user_id: user.user_id.clone(),
        problem_id,
        language_id,
        code,
    };

    if let Err(e) = state.submissions.save_submission(submission).await {
        warn!(user_id = %user.user_id, error = %e, "Failed to persist submission");
    }
}

/// GET /health - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus scrape endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
}
