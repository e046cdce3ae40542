//! Read-only repository for the `submissions` table.

use dashscore_core::types::DbId;
use sqlx::PgPool;

use crate::models::submission::Submission;

/// Column list for submissions queries.
const COLUMNS: &str =
    "id, driver_id, duration_secs, anonymized, footage_location, created_at, updated_at";

/// Provides lookups for uploaded submissions.
pub struct SubmissionRepo;

impl SubmissionRepo {
    /// Find a submission by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Submission>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM submissions WHERE id = $1");
        sqlx::query_as::<_, Submission>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
