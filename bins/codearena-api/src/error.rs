use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use codearena_common::types::FieldError;
use codearena_judge::SubmissionError;
use serde::Serialize;

/// Error body shared by every endpoint:
///
/// ```json
/// { "statusCode": 400, "success": false, "code": "validation_error",
///   "message": "...", "errors": [{ "field": "code", "message": "Code is required" }] }
/// ```
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub errors: Vec<FieldError>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    status_code: u16,
    success: bool,
    code: &'a str,
    message: &'a str,
    errors: &'a [FieldError],
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        let status = match &err {
            SubmissionError::Validation(_)
            | SubmissionError::UnsupportedLanguageForProblem { .. }
            | SubmissionError::UnsupportedLanguage(_)
            | SubmissionError::Configuration(_) => StatusCode::BAD_REQUEST,
            SubmissionError::ProblemNotFound(_) => StatusCode::NOT_FOUND,
            SubmissionError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            SubmissionError::Dispatch(_)
            | SubmissionError::Fetch(_)
            | SubmissionError::ExecutionTimeout(_)
            | SubmissionError::Protocol(_)
            | SubmissionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self {
            status,
            code: err.kind(),
            message: err.to_string(),
            errors: err.field_errors().to_vec(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("Invalid request body: {}", rejection.body_text()),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status_code: self.status.as_u16(),
            success: false,
            code: self.code,
            message: &self.message,
            errors: &self.errors,
        };
        (self.status, Json(body)).into_response()
    }
}
