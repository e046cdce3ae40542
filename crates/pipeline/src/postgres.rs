//! PostgreSQL-backed capability implementations.
//!
//! Thin adapters from the capability traits onto the `dashscore-db`
//! repositories.

use std::time::Duration;

use async_trait::async_trait;
use dashscore_core::earnings::EarningsResult;
use dashscore_core::extraction::Scenario;
use dashscore_core::types::DbId;
use dashscore_db::models::earnings::{CreateEarningsEntry, EarningsEntry};
use dashscore_db::models::scenario::{CreateScenario, ScenarioRow};
use dashscore_db::repositories::{EarningsRepo, PipelineLeaseRepo, ScenarioRepo, SubmissionRepo};
use dashscore_db::DbPool;

use crate::capabilities::{
    EarningsLedger, Lease, LeaseManager, ScenarioStore, SubmissionRecord, SubmissionStore,
};
use crate::error::StoreError;
use crate::lease::{new_holder_token, ttl_to_chrono};

/// Reads submissions from the `submissions` table.
pub struct PgSubmissionStore {
    pool: DbPool,
}

impl PgSubmissionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionStore for PgSubmissionStore {
    async fn get(&self, submission_id: DbId) -> Result<Option<SubmissionRecord>, StoreError> {
        let row = SubmissionRepo::find_by_id(&self.pool, submission_id).await?;
        Ok(row.map(SubmissionRecord::from))
    }
}

/// Scenario storage with a transactional full replace.
pub struct PgScenarioStore {
    pool: DbPool,
}

impl PgScenarioStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn to_create(scenarios: &[Scenario]) -> Vec<CreateScenario> {
    scenarios.iter().map(CreateScenario::from).collect()
}

fn rows_to_scenarios(rows: &[ScenarioRow]) -> Result<Vec<Scenario>, StoreError> {
    rows.iter()
        .map(|row| row.to_scenario().map_err(StoreError::from))
        .collect()
}

#[async_trait]
impl ScenarioStore for PgScenarioStore {
    async fn delete_all(&self, submission_id: DbId) -> Result<u64, StoreError> {
        Ok(ScenarioRepo::delete_all(&self.pool, submission_id).await?)
    }

    async fn insert_all(
        &self,
        submission_id: DbId,
        scenarios: &[Scenario],
    ) -> Result<usize, StoreError> {
        let rows =
            ScenarioRepo::insert_all(&self.pool, submission_id, &to_create(scenarios)).await?;
        Ok(rows.len())
    }

    async fn list(&self, submission_id: DbId) -> Result<Vec<Scenario>, StoreError> {
        let rows = ScenarioRepo::list_for_submission(&self.pool, submission_id).await?;
        rows_to_scenarios(&rows)
    }

    async fn replace_all(
        &self,
        submission_id: DbId,
        scenarios: &[Scenario],
    ) -> Result<usize, StoreError> {
        let rows =
            ScenarioRepo::replace_all(&self.pool, submission_id, &to_create(scenarios)).await?;
        Ok(rows.len())
    }
}

/// Appends to the `earnings_ledger` table.
pub struct PgEarningsLedger {
    pool: DbPool,
}

impl PgEarningsLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EarningsLedger for PgEarningsLedger {
    async fn append(
        &self,
        submission_id: DbId,
        result: &EarningsResult,
        supersedes: Option<DbId>,
    ) -> Result<EarningsEntry, StoreError> {
        let input = CreateEarningsEntry::from_result(submission_id, result, supersedes);
        Ok(EarningsRepo::append(&self.pool, &input).await?)
    }

    async fn latest_for_submission(
        &self,
        submission_id: DbId,
    ) -> Result<Option<EarningsEntry>, StoreError> {
        Ok(EarningsRepo::latest_for_submission(&self.pool, submission_id).await?)
    }

    async fn list_for_driver(&self, driver_id: DbId) -> Result<Vec<EarningsEntry>, StoreError> {
        Ok(EarningsRepo::list_for_driver(&self.pool, driver_id).await?)
    }
}

/// Leases shared by every process connected to the same database.
pub struct PgLeaseManager {
    pool: DbPool,
}

impl PgLeaseManager {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeaseManager for PgLeaseManager {
    async fn acquire(
        &self,
        submission_id: DbId,
        ttl: Duration,
    ) -> Result<Option<Lease>, StoreError> {
        let holder = new_holder_token();
        let ttl_secs = ttl_to_chrono(ttl).num_milliseconds() as f64 / 1000.0;
        let row = PipelineLeaseRepo::acquire(&self.pool, submission_id, &holder, ttl_secs).await?;
        Ok(row.map(|lease| Lease {
            submission_id: lease.submission_id,
            holder: lease.holder,
            expires_at: lease.expires_at,
        }))
    }

    async fn release(&self, lease: &Lease) -> Result<bool, StoreError> {
        Ok(PipelineLeaseRepo::release(&self.pool, lease.submission_id, &lease.holder).await?)
    }

    async fn sweep_expired(&self) -> Result<u64, StoreError> {
        Ok(PipelineLeaseRepo::cleanup_expired(&self.pool).await?)
    }

    async fn purge_released(&self, retention: Duration) -> Result<u64, StoreError> {
        Ok(PipelineLeaseRepo::purge_released(&self.pool, retention.as_secs_f64()).await?)
    }
}
