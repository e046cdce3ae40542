//! Handlers for driver earnings.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use dashscore_core::types::DbId;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /drivers/{id}/earnings -- ledger entries for a driver, newest first.
pub async fn list_driver_earnings(
    State(state): State<AppState>,
    Path(driver_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let entries = state.orchestrator.driver_earnings(driver_id).await?;
    Ok(Json(DataResponse { data: entries }))
}
