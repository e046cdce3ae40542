//! Handlers for the submission pipeline endpoints.
//!
//! Every write runs on its own task: if the request is dropped (client
//! disconnect or request timeout) the run keeps going, so persistence is
//! never abandoned half way. Dropping a `process` request cancels the run
//! through its token, which only takes effect before persistence starts.

use std::future::Future;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use dashscore_core::types::DbId;
use dashscore_pipeline::error::PipelineError;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Await a pipeline operation on a detached task.
async fn detached<T, F>(operation: F) -> AppResult<T>
where
    F: Future<Output = Result<T, PipelineError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(operation)
        .await
        .map_err(|e| AppError::InternalError(format!("Pipeline task failed: {e}")))?
        .map_err(AppError::from)
}

// ---------------------------------------------------------------------------
// POST /submissions/{id}/process
// ---------------------------------------------------------------------------

/// Run the full pipeline for an anonymized submission.
pub async fn process_submission(
    State(state): State<AppState>,
    Path(submission_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let orchestrator = state.orchestrator.clone();
    let report = detached(async move {
        orchestrator
            .process_with_cancel(submission_id, cancel)
            .await
    })
    .await;
    guard.disarm();

    Ok(Json(DataResponse { data: report? }))
}

// ---------------------------------------------------------------------------
// POST /submissions/{id}/regenerate
// ---------------------------------------------------------------------------

/// Clear the submission's scenarios and run the pipeline again.
pub async fn regenerate_submission(
    State(state): State<AppState>,
    Path(submission_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let orchestrator = state.orchestrator.clone();
    let report = detached(async move { orchestrator.regenerate(submission_id).await }).await?;
    Ok(Json(DataResponse { data: report }))
}

// ---------------------------------------------------------------------------
// POST /submissions/{id}/reset
// ---------------------------------------------------------------------------

/// Delete every scenario of the submission. Repeatable.
pub async fn reset_submission(
    State(state): State<AppState>,
    Path(submission_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let orchestrator = state.orchestrator.clone();
    let outcome = detached(async move { orchestrator.reset(submission_id).await }).await?;
    Ok(Json(DataResponse { data: outcome }))
}

// ---------------------------------------------------------------------------
// POST /submissions/{id}/reprice
// ---------------------------------------------------------------------------

/// Price the stored scenarios again and append a superseding ledger entry.
pub async fn reprice_submission(
    State(state): State<AppState>,
    Path(submission_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let orchestrator = state.orchestrator.clone();
    let summary = detached(async move { orchestrator.reprice(submission_id).await }).await?;
    Ok(Json(DataResponse { data: summary }))
}

// ---------------------------------------------------------------------------
// GET /submissions/{id}/scenarios
// ---------------------------------------------------------------------------

/// List the submission's persisted scenarios.
pub async fn list_scenarios(
    State(state): State<AppState>,
    Path(submission_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let scenarios = state.orchestrator.scenarios(submission_id).await?;
    Ok(Json(DataResponse { data: scenarios }))
}
