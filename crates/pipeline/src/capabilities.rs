//! Capability traits for everything the pipeline reaches outside itself.
//!
//! The orchestrator only sees these traits, so extraction, scoring and
//! pricing can be exercised against in-memory implementations with no
//! network or database.

use std::time::Duration;

use async_trait::async_trait;
use dashscore_core::detection::NormalizedDetections;
use dashscore_core::earnings::EarningsResult;
use dashscore_core::extraction::Scenario;
use dashscore_core::types::{DbId, Timestamp};
use dashscore_db::models::earnings::EarningsEntry;
use dashscore_db::models::submission::Submission;
use serde::Serialize;

use crate::error::{AnalysisError, StoreError};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// The subset of a submission the pipeline needs. Never written back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionRecord {
    pub id: DbId,
    pub driver_id: DbId,
    pub duration_secs: f64,
    pub anonymized: bool,
    pub footage_location: String,
}

impl From<Submission> for SubmissionRecord {
    fn from(row: Submission) -> Self {
        Self {
            id: row.id,
            driver_id: row.driver_id,
            duration_secs: row.duration_secs,
            anonymized: row.anonymized,
            footage_location: row.footage_location,
        }
    }
}

/// Proof of exclusive ownership of one submission's pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub submission_id: DbId,
    pub holder: String,
    pub expires_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Black-box computer-vision capability.
#[async_trait]
pub trait VideoAnalyzer: Send + Sync {
    /// Analyze anonymized footage and return normalized detections in
    /// canonical order. Must not mutate any submission state.
    async fn analyze(&self, footage_location: &str) -> Result<NormalizedDetections, AnalysisError>;
}

/// Read access to uploaded submissions.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn get(&self, submission_id: DbId) -> Result<Option<SubmissionRecord>, StoreError>;
}

/// Per-submission scenario storage supporting the regenerate flow.
#[async_trait]
pub trait ScenarioStore: Send + Sync {
    /// Delete every scenario of the submission. Repeatable; returns the
    /// number removed.
    async fn delete_all(&self, submission_id: DbId) -> Result<u64, StoreError>;

    /// Insert scenarios for the submission, pending moderation.
    async fn insert_all(
        &self,
        submission_id: DbId,
        scenarios: &[Scenario],
    ) -> Result<usize, StoreError>;

    /// Scenarios for the submission in canonical order.
    async fn list(&self, submission_id: DbId) -> Result<Vec<Scenario>, StoreError>;

    /// Delete-then-insert. Implementations backed by a transactional store
    /// should override this to make the swap atomic.
    async fn replace_all(
        &self,
        submission_id: DbId,
        scenarios: &[Scenario],
    ) -> Result<usize, StoreError> {
        self.delete_all(submission_id).await?;
        self.insert_all(submission_id, scenarios).await
    }
}

/// Append-only driver earnings ledger.
#[async_trait]
pub trait EarningsLedger: Send + Sync {
    /// Append a pending-payment entry, optionally superseding an earlier one.
    async fn append(
        &self,
        submission_id: DbId,
        result: &EarningsResult,
        supersedes: Option<DbId>,
    ) -> Result<EarningsEntry, StoreError>;

    async fn latest_for_submission(
        &self,
        submission_id: DbId,
    ) -> Result<Option<EarningsEntry>, StoreError>;

    /// Entries for a driver, newest first.
    async fn list_for_driver(&self, driver_id: DbId) -> Result<Vec<EarningsEntry>, StoreError>;
}

/// Single-flight guard keyed by submission id.
#[async_trait]
pub trait LeaseManager: Send + Sync {
    /// Take the lease, or `None` if another live holder owns it.
    async fn acquire(
        &self,
        submission_id: DbId,
        ttl: Duration,
    ) -> Result<Option<Lease>, StoreError>;

    /// Give the lease back. `false` if it had already lapsed.
    async fn release(&self, lease: &Lease) -> Result<bool, StoreError>;

    /// Drop every lease past its expiry. Returns how many were dropped.
    async fn sweep_expired(&self) -> Result<u64, StoreError>;

    /// Forget leases released more than `retention` ago. Returns how many
    /// were deleted.
    async fn purge_released(&self, retention: Duration) -> Result<u64, StoreError>;
}
