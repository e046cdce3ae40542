//! Repository for the `pipeline_leases` table.

use dashscore_core::types::DbId;
use sqlx::PgPool;

use crate::models::lease::PipelineLease;

/// Column list for pipeline_leases queries.
const COLUMNS: &str =
    "id, submission_id, holder, acquired_at, expires_at, released_at, is_active";

/// Provides acquire/release operations for per-submission run leases.
pub struct PipelineLeaseRepo;

impl PipelineLeaseRepo {
    /// Attempt to acquire the lease for a submission.
    ///
    /// An active lease past its expiry is deactivated first, so a crashed
    /// run cannot block the submission forever. The insert then relies on
    /// the partial unique index on active leases: `None` means another
    /// holder currently owns the submission.
    pub async fn acquire(
        pool: &PgPool,
        submission_id: DbId,
        holder: &str,
        ttl_secs: f64,
    ) -> Result<Option<PipelineLease>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "UPDATE pipeline_leases SET is_active = false, released_at = NOW() \
             WHERE submission_id = $1 AND is_active = true AND expires_at < NOW()",
        )
        .bind(submission_id)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "INSERT INTO pipeline_leases (submission_id, holder, expires_at) \
             VALUES ($1, $2, NOW() + make_interval(secs => $3)) \
             ON CONFLICT (submission_id) WHERE is_active = true \
             DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let lease = sqlx::query_as::<_, PipelineLease>(&query)
            .bind(submission_id)
            .bind(holder)
            .bind(ttl_secs)
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(lease)
    }

    /// Release a lease. Only the holder can release.
    ///
    /// Returns `true` if a lease was released, `false` if the holder no
    /// longer owns an active lease (for example after expiry).
    pub async fn release(
        pool: &PgPool,
        submission_id: DbId,
        holder: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE pipeline_leases SET is_active = false, released_at = NOW() \
             WHERE submission_id = $1 AND holder = $2 AND is_active = true",
        )
        .bind(submission_id)
        .bind(holder)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Get the currently active lease for a submission, if any.
    pub async fn get_active(
        pool: &PgPool,
        submission_id: DbId,
    ) -> Result<Option<PipelineLease>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM pipeline_leases \
             WHERE submission_id = $1 AND is_active = true"
        );
        sqlx::query_as::<_, PipelineLease>(&query)
            .bind(submission_id)
            .fetch_optional(pool)
            .await
    }

    /// Deactivate all expired leases. Returns the number released.
    pub async fn cleanup_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE pipeline_leases SET is_active = false, released_at = NOW() \
             WHERE is_active = true AND expires_at < NOW()",
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete inactive leases released more than `retention_secs` ago.
    /// Returns the number of rows deleted.
    pub async fn purge_released(pool: &PgPool, retention_secs: f64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM pipeline_leases \
             WHERE is_active = false \
               AND released_at < NOW() - make_interval(secs => $1)",
        )
        .bind(retention_secs)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
