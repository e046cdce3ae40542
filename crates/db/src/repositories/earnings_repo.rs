//! Repository for the append-only `earnings_ledger` table.

use dashscore_core::types::DbId;
use sqlx::PgPool;

use crate::models::earnings::{CreateEarningsEntry, EarningsEntry};

/// Column list for earnings_ledger queries.
const COLUMNS: &str = "id, driver_id, submission_id, currency, total_cents, \
    base_duration_cents, scenario_count_cents, edge_case_bonus_cents, \
    multiplier_uplift_cents, value_score_multiplier, value_score, duration_secs, \
    scenario_count, edge_case_count, status, supersedes_id, created_at";

/// Provides append and read operations for the earnings ledger.
///
/// Entries are never updated; a correction is a new entry that references
/// the entry it supersedes.
pub struct EarningsRepo;

impl EarningsRepo {
    /// Append a new ledger entry in the `pending_payment` state.
    pub async fn append(
        pool: &PgPool,
        input: &CreateEarningsEntry,
    ) -> Result<EarningsEntry, sqlx::Error> {
        let query = format!(
            "INSERT INTO earnings_ledger \
                (driver_id, submission_id, currency, total_cents, base_duration_cents, \
                 scenario_count_cents, edge_case_bonus_cents, multiplier_uplift_cents, \
                 value_score_multiplier, value_score, duration_secs, scenario_count, \
                 edge_case_count, supersedes_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EarningsEntry>(&query)
            .bind(input.driver_id)
            .bind(input.submission_id)
            .bind(&input.currency)
            .bind(input.total_cents)
            .bind(input.base_duration_cents)
            .bind(input.scenario_count_cents)
            .bind(input.edge_case_bonus_cents)
            .bind(input.multiplier_uplift_cents)
            .bind(input.value_score_multiplier)
            .bind(input.value_score)
            .bind(input.duration_secs)
            .bind(input.scenario_count)
            .bind(input.edge_case_count)
            .bind(input.supersedes_id)
            .fetch_one(pool)
            .await
    }

    /// The most recent entry for a submission, if any.
    pub async fn latest_for_submission(
        pool: &PgPool,
        submission_id: DbId,
    ) -> Result<Option<EarningsEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM earnings_ledger \
             WHERE submission_id = $1 \
             ORDER BY id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, EarningsEntry>(&query)
            .bind(submission_id)
            .fetch_optional(pool)
            .await
    }

    /// List a driver's entries, newest first.
    pub async fn list_for_driver(
        pool: &PgPool,
        driver_id: DbId,
    ) -> Result<Vec<EarningsEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM earnings_ledger \
             WHERE driver_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, EarningsEntry>(&query)
            .bind(driver_id)
            .fetch_all(pool)
            .await
    }
}
