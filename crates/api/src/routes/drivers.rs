use axum::routing::get;
use axum::Router;

use crate::handlers::earnings;
use crate::state::AppState;

/// Driver routes mounted at `/drivers`.
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/earnings", get(earnings::list_driver_earnings))
}
