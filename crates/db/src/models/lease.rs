//! Pipeline lease model.

use dashscore_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `pipeline_leases` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PipelineLease {
    pub id: DbId,
    pub submission_id: DbId,
    pub holder: String,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
    pub released_at: Option<Timestamp>,
    pub is_active: bool,
}
