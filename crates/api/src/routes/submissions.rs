use axum::routing::{get, post};
use axum::Router;

use crate::handlers::submissions;
use crate::state::AppState;

/// Submission routes mounted at `/submissions`.
///
/// ```text
/// POST /{id}/process      -> process_submission
/// POST /{id}/regenerate   -> regenerate_submission
/// POST /{id}/reset        -> reset_submission
/// POST /{id}/reprice      -> reprice_submission
/// GET  /{id}/scenarios    -> list_scenarios
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/process", post(submissions::process_submission))
        .route("/{id}/regenerate", post(submissions::regenerate_submission))
        .route("/{id}/reset", post(submissions::reset_submission))
        .route("/{id}/reprice", post(submissions::reprice_submission))
        .route("/{id}/scenarios", get(submissions::list_scenarios))
}
