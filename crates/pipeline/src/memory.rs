//! In-memory capability implementations.
//!
//! Used by tests and for running the service without a database. All
//! state lives behind `tokio` locks; nothing is shared between instances.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashscore_core::earnings::EarningsResult;
use dashscore_core::extraction::Scenario;
use dashscore_core::types::DbId;
use dashscore_db::models::earnings::{CreateEarningsEntry, EarningsEntry, STATUS_PENDING_PAYMENT};
use tokio::sync::RwLock;

use crate::capabilities::{EarningsLedger, ScenarioStore, SubmissionRecord, SubmissionStore};
use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Submissions
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemorySubmissionStore {
    submissions: RwLock<HashMap<DbId, SubmissionRecord>>,
}

impl InMemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or overwrite a submission, standing in for the upload service.
    pub async fn insert(&self, record: SubmissionRecord) {
        self.submissions.write().await.insert(record.id, record);
    }
}

#[async_trait]
impl SubmissionStore for InMemorySubmissionStore {
    async fn get(&self, submission_id: DbId) -> Result<Option<SubmissionRecord>, StoreError> {
        Ok(self.submissions.read().await.get(&submission_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryScenarioStore {
    scenarios: RwLock<HashMap<DbId, Vec<Scenario>>>,
}

impl InMemoryScenarioStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scenario rows held for a submission.
    pub async fn count(&self, submission_id: DbId) -> usize {
        self.scenarios
            .read()
            .await
            .get(&submission_id)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl ScenarioStore for InMemoryScenarioStore {
    async fn delete_all(&self, submission_id: DbId) -> Result<u64, StoreError> {
        let removed = self.scenarios.write().await.remove(&submission_id);
        Ok(removed.map_or(0, |rows| rows.len() as u64))
    }

    async fn insert_all(
        &self,
        submission_id: DbId,
        scenarios: &[Scenario],
    ) -> Result<usize, StoreError> {
        let mut store = self.scenarios.write().await;
        let rows = store.entry(submission_id).or_default();
        rows.extend(scenarios.iter().cloned().map(|mut s| {
            s.approved = false;
            s
        }));
        Ok(scenarios.len())
    }

    async fn list(&self, submission_id: DbId) -> Result<Vec<Scenario>, StoreError> {
        let mut rows = self
            .scenarios
            .read()
            .await
            .get(&submission_id)
            .cloned()
            .unwrap_or_default();
        rows.sort_by(Scenario::canonical_cmp);
        Ok(rows)
    }

    async fn replace_all(
        &self,
        submission_id: DbId,
        scenarios: &[Scenario],
    ) -> Result<usize, StoreError> {
        let fresh: Vec<Scenario> = scenarios
            .iter()
            .cloned()
            .map(|mut s| {
                s.approved = false;
                s
            })
            .collect();
        self.scenarios.write().await.insert(submission_id, fresh);
        Ok(scenarios.len())
    }
}

// ---------------------------------------------------------------------------
// Earnings ledger
// ---------------------------------------------------------------------------

pub struct InMemoryEarningsLedger {
    entries: RwLock<Vec<EarningsEntry>>,
    next_id: AtomicI64,
}

impl Default for InMemoryEarningsLedger {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl InMemoryEarningsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry in append order.
    pub async fn entries(&self) -> Vec<EarningsEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl EarningsLedger for InMemoryEarningsLedger {
    async fn append(
        &self,
        submission_id: DbId,
        result: &EarningsResult,
        supersedes: Option<DbId>,
    ) -> Result<EarningsEntry, StoreError> {
        let input = CreateEarningsEntry::from_result(submission_id, result, supersedes);
        let entry = EarningsEntry {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            driver_id: input.driver_id,
            submission_id: input.submission_id,
            currency: input.currency,
            total_cents: input.total_cents,
            base_duration_cents: input.base_duration_cents,
            scenario_count_cents: input.scenario_count_cents,
            edge_case_bonus_cents: input.edge_case_bonus_cents,
            multiplier_uplift_cents: input.multiplier_uplift_cents,
            value_score_multiplier: input.value_score_multiplier,
            value_score: input.value_score,
            duration_secs: input.duration_secs,
            scenario_count: input.scenario_count,
            edge_case_count: input.edge_case_count,
            status: STATUS_PENDING_PAYMENT.to_string(),
            supersedes_id: input.supersedes_id,
            created_at: Utc::now(),
        };
        self.entries.write().await.push(entry.clone());
        Ok(entry)
    }

    async fn latest_for_submission(
        &self,
        submission_id: DbId,
    ) -> Result<Option<EarningsEntry>, StoreError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| e.submission_id == submission_id)
            .max_by_key(|e| e.id)
            .cloned())
    }

    async fn list_for_driver(&self, driver_id: DbId) -> Result<Vec<EarningsEntry>, StoreError> {
        let mut entries: Vec<EarningsEntry> = self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| e.driver_id == driver_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(entries)
    }
}
