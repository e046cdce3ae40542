use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dashscore_core::error::CoreError;
use dashscore_pipeline::error::{ErrorKind, PersistedHalf, PipelineError, RetryHint};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`PipelineError`] and [`CoreError`] and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON error
/// responses carrying a retry hint.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// An error from the analysis-to-earnings pipeline.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A domain-level error from `dashscore_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, hint) = match &self {
            AppError::Pipeline(err) => classify_pipeline_error(err),

            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                    RetryHint::NotRetryable,
                ),
                CoreError::Validation(msg) => (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    msg.clone(),
                    RetryHint::NotRetryable,
                ),
                CoreError::Conflict(msg) => (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    msg.clone(),
                    RetryHint::NotRetryable,
                ),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        INTERNAL_MESSAGE.to_string(),
                        RetryHint::NotRetryable,
                    )
                }
            },

            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
                RetryHint::NotRetryable,
            ),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    INTERNAL_MESSAGE.to_string(),
                    RetryHint::NotRetryable,
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
            "retryable": hint.is_retryable(),
            "retry_after_secs": hint.after_secs(),
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map a pipeline error onto an HTTP status, its stable code, a message
/// safe to show callers, and its retry hint.
///
/// Storage failures are logged and sanitized; everything else is shown
/// verbatim.
fn classify_pipeline_error(err: &PipelineError) -> (StatusCode, &'static str, String, RetryHint) {
    let kind = err.kind();
    let hint = err.retry_hint();

    let (status, message) = match kind {
        ErrorKind::SubmissionNotFound => (StatusCode::NOT_FOUND, err.to_string()),
        ErrorKind::PreconditionFailed => (StatusCode::PRECONDITION_FAILED, err.to_string()),
        ErrorKind::AlreadyInProgress => (StatusCode::CONFLICT, err.to_string()),
        ErrorKind::InvalidInput => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        ErrorKind::AnalysisUnavailable | ErrorKind::AnalysisRejected => {
            (StatusCode::BAD_GATEWAY, err.to_string())
        }
        ErrorKind::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        ErrorKind::PartialPersistence => {
            tracing::error!(error = %err, "Pipeline persisted only one half");
            let message = match err {
                PipelineError::PartialPersistence {
                    written: PersistedHalf::Scenarios,
                    ..
                } => "Scenarios were saved but the earnings entry was not; reprice to finish",
                _ => "Earnings were saved but the scenarios were not; regenerate to finish",
            };
            (StatusCode::INTERNAL_SERVER_ERROR, message.to_string())
        }
        ErrorKind::PersistenceFailed | ErrorKind::StorageError => {
            tracing::error!(error = %err, "Pipeline storage failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "A storage error occurred".to_string(),
            )
        }
    };

    (status, kind.as_str(), message, hint)
}
