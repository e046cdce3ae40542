use std::sync::Arc;

use dashscore_pipeline::orchestrator::Orchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone; everything inside is an `Arc` or a pool handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool, used for health checks.
    pub pool: dashscore_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Runs, resets and reprices submissions.
    pub orchestrator: Arc<Orchestrator>,
}
