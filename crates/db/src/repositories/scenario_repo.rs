//! Repository for the `scenarios` table.

use dashscore_core::types::DbId;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::scenario::{CreateScenario, ScenarioRow};

/// Column list for scenarios queries.
const COLUMNS: &str = "id, submission_id, scenario_type, start_secs, end_secs, confidence, \
    event_count, is_edge_case, approved, created_at";

/// Provides the full-replace write path and reads for scenarios.
pub struct ScenarioRepo;

impl ScenarioRepo {
    /// List a submission's scenarios ordered by start offset, then type.
    pub async fn list_for_submission(
        pool: &PgPool,
        submission_id: DbId,
    ) -> Result<Vec<ScenarioRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM scenarios \
             WHERE submission_id = $1 \
             ORDER BY start_secs ASC, scenario_type ASC, end_secs ASC"
        );
        sqlx::query_as::<_, ScenarioRow>(&query)
            .bind(submission_id)
            .fetch_all(pool)
            .await
    }

    /// Delete every scenario for a submission.
    ///
    /// Returns the number of rows removed; zero is a successful no-op.
    pub async fn delete_all(pool: &PgPool, submission_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM scenarios WHERE submission_id = $1")
            .bind(submission_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Insert scenarios for a submission within a single transaction,
    /// leaving any existing rows in place.
    pub async fn insert_all(
        pool: &PgPool,
        submission_id: DbId,
        scenarios: &[CreateScenario],
    ) -> Result<Vec<ScenarioRow>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let rows = Self::insert_rows(&mut tx, submission_id, scenarios).await?;
        tx.commit().await?;
        Ok(rows)
    }

    /// Replace all scenarios for a submission within a single transaction.
    ///
    /// Prior rows are deleted before the new set is inserted, so readers
    /// never see a mix of two runs.
    pub async fn replace_all(
        pool: &PgPool,
        submission_id: DbId,
        scenarios: &[CreateScenario],
    ) -> Result<Vec<ScenarioRow>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM scenarios WHERE submission_id = $1")
            .bind(submission_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let rows = Self::insert_rows(&mut tx, submission_id, scenarios).await?;
        tx.commit().await?;

        tracing::debug!(
            submission_id,
            deleted,
            inserted = rows.len(),
            "Replaced submission scenarios"
        );
        Ok(rows)
    }

    async fn insert_rows(
        tx: &mut Transaction<'_, Postgres>,
        submission_id: DbId,
        scenarios: &[CreateScenario],
    ) -> Result<Vec<ScenarioRow>, sqlx::Error> {
        let query = format!(
            "INSERT INTO scenarios \
                (submission_id, scenario_type, start_secs, end_secs, confidence, \
                 event_count, is_edge_case, approved) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, false) \
             RETURNING {COLUMNS}"
        );

        let mut rows = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            let row = sqlx::query_as::<_, ScenarioRow>(&query)
                .bind(submission_id)
                .bind(&scenario.scenario_type)
                .bind(scenario.start_secs)
                .bind(scenario.end_secs)
                .bind(scenario.confidence)
                .bind(scenario.event_count)
                .bind(scenario.is_edge_case)
                .fetch_one(&mut **tx)
                .await?;
            rows.push(row);
        }
        Ok(rows)
    }
}
