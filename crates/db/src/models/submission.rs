//! Submission model. Rows are created by the upload service; the
//! pipeline only reads them.

use dashscore_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `submissions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Submission {
    pub id: DbId,
    pub driver_id: DbId,
    pub duration_secs: f64,
    pub anonymized: bool,
    pub footage_location: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
