pub mod drivers;
pub mod health;
pub mod submissions;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /submissions/{id}/process        run the pipeline (POST)
/// /submissions/{id}/regenerate     reset then run (POST)
/// /submissions/{id}/reset          delete scenarios (POST)
/// /submissions/{id}/reprice        re-append earnings (POST)
/// /submissions/{id}/scenarios      persisted scenarios (GET)
///
/// /drivers/{id}/earnings           ledger entries (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/submissions", submissions::router())
        .nest("/drivers", drivers::router())
}
