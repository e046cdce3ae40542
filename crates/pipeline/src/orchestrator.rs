//! Per-submission pipeline runs.
//!
//! A run walks `REQUESTED → ANALYZING → EXTRACTING → SCORING → PRICING →
//! PERSISTING → COMPLETED`, dropping to `FAILED` from any non-terminal
//! state. Preconditions are checked before the run starts and every run
//! holds the submission's lease from `REQUESTED` until it ends.
//!
//! Cancellation is honored up to the start of `PERSISTING`; after that
//! both writes are attempted and their outcome reported.

use std::sync::Arc;

use dashscore_core::detection::NormalizedDetections;
use dashscore_core::earnings::{self, EarningsResult};
use dashscore_core::error::CoreError;
use dashscore_core::extraction::{self, Extraction, Scenario};
use dashscore_core::types::DbId;
use dashscore_core::value_score;
use dashscore_db::models::earnings::EarningsEntry;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::capabilities::{
    EarningsLedger, Lease, LeaseManager, ScenarioStore, SubmissionRecord, SubmissionStore,
    VideoAnalyzer,
};
use crate::config::PipelineConfig;
use crate::error::{AnalysisError, PersistedHalf, PipelineError};
use crate::retry::{retry_with_backoff, RetryError};

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Requested,
    Analyzing,
    Extracting,
    Scoring,
    Pricing,
    Persisting,
    Completed,
    Failed,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "REQUESTED",
            Self::Analyzing => "ANALYZING",
            Self::Extracting => "EXTRACTING",
            Self::Scoring => "SCORING",
            Self::Pricing => "PRICING",
            Self::Persisting => "PERSISTING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a cancellation request still takes effect in this state.
    pub fn is_cancellable(self) -> bool {
        matches!(
            self,
            Self::Requested | Self::Analyzing | Self::Extracting | Self::Scoring | Self::Pricing
        )
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// What a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub submission_id: DbId,
    pub driver_id: DbId,
    pub scenarios: Vec<Scenario>,
    pub edge_cases: Vec<Scenario>,
    pub value_score: f64,
    pub estimated_earnings: EarningsResult,
    pub ledger_entry_id: DbId,
}

/// A summary plus how the run got there.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub summary: PipelineSummary,
    /// States entered, in order, ending with `COMPLETED`.
    pub transitions: Vec<RunState>,
    pub analysis_attempts: u32,
    /// Detections the adapter could not map onto a scenario type.
    pub dropped_detections: usize,
}

/// Outcome of the reset half of the regeneration contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResetOutcome {
    pub submission_id: DbId,
    pub scenarios_removed: u64,
}

/// Counts from one lease sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LeaseSweep {
    /// Leases that lapsed without being released.
    pub expired: u64,
    /// Released leases deleted after the retention window.
    pub purged: u64,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Everything the orchestrator reaches outside itself.
#[derive(Clone)]
pub struct Capabilities {
    pub analyzer: Arc<dyn VideoAnalyzer>,
    pub submissions: Arc<dyn SubmissionStore>,
    pub scenarios: Arc<dyn ScenarioStore>,
    pub ledger: Arc<dyn EarningsLedger>,
    pub leases: Arc<dyn LeaseManager>,
}

pub struct Orchestrator {
    caps: Capabilities,
    config: PipelineConfig,
}

/// Running record of the states one run has entered.
struct RunTracker {
    submission_id: DbId,
    transitions: Vec<RunState>,
}

impl RunTracker {
    fn new(submission_id: DbId) -> Self {
        tracing::info!(submission_id, "Pipeline run requested");
        Self {
            submission_id,
            transitions: vec![RunState::Requested],
        }
    }

    fn current(&self) -> RunState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(RunState::Requested)
    }

    /// Move to `next`, or fail with `Cancelled` if the token fired while
    /// the run could still be cancelled.
    fn advance(&mut self, next: RunState, cancel: &CancellationToken) -> Result<(), PipelineError> {
        // PERSISTING itself is entered only while the token is unfired.
        if !next.is_terminal() && cancel.is_cancelled() {
            return Err(self.cancelled());
        }
        tracing::debug!(submission_id = self.submission_id, state = %next, "Pipeline state");
        self.transitions.push(next);
        Ok(())
    }

    fn cancelled(&self) -> PipelineError {
        let state = self.current();
        tracing::info!(
            submission_id = self.submission_id,
            state = %state,
            "Pipeline run cancelled"
        );
        PipelineError::Cancelled { state }
    }

    fn fail(&mut self, err: &PipelineError) {
        tracing::warn!(
            submission_id = self.submission_id,
            state = %self.current(),
            code = err.kind().as_str(),
            error = %err,
            "Pipeline run failed"
        );
        self.transitions.push(RunState::Failed);
    }
}

impl Orchestrator {
    pub fn new(caps: Capabilities, config: PipelineConfig) -> Self {
        Self { caps, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline for a submission.
    pub async fn process(&self, submission_id: DbId) -> Result<RunReport, PipelineError> {
        self.process_with_cancel(submission_id, CancellationToken::new())
            .await
    }

    /// Run the pipeline, giving up with [`PipelineError::Cancelled`] if
    /// `cancel` fires before persistence starts.
    pub async fn process_with_cancel(
        &self,
        submission_id: DbId,
        cancel: CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let submission = self.check_runnable(submission_id).await?;
        let lease = self.acquire(submission_id).await?;

        let result = self.run(&submission, &cancel).await;
        self.release(&lease).await;
        result
    }

    /// Delete every scenario of the submission, then run the pipeline.
    ///
    /// The lease is held across both halves so no other request can
    /// observe the empty set.
    pub async fn regenerate(&self, submission_id: DbId) -> Result<RunReport, PipelineError> {
        let submission = self.check_runnable(submission_id).await?;
        let lease = self.acquire(submission_id).await?;

        let result = match self.clear_scenarios(submission_id).await {
            Ok(_) => self.run(&submission, &CancellationToken::new()).await,
            Err(err) => Err(err),
        };
        self.release(&lease).await;
        result
    }

    /// Delete every scenario of the submission. Safe to repeat: clearing
    /// an empty set succeeds and removes nothing.
    pub async fn reset(&self, submission_id: DbId) -> Result<ResetOutcome, PipelineError> {
        self.load(submission_id).await?;
        let lease = self.acquire(submission_id).await?;

        let result = self.clear_scenarios(submission_id).await;
        self.release(&lease).await;

        let scenarios_removed = result?;
        Ok(ResetOutcome {
            submission_id,
            scenarios_removed,
        })
    }

    /// Price the persisted scenarios again and append a new ledger entry.
    ///
    /// Retries the earnings half of a run that ended in
    /// `PARTIAL_PERSISTENCE` without re-analyzing the footage. Any earlier
    /// entry for the submission is superseded.
    pub async fn reprice(&self, submission_id: DbId) -> Result<PipelineSummary, PipelineError> {
        let submission = self.load(submission_id).await?;
        validate_duration(&submission)?;
        let lease = self.acquire(submission_id).await?;

        let result = self.reprice_locked(&submission).await;
        self.release(&lease).await;
        result
    }

    /// Persisted scenarios for a submission, in canonical order.
    pub async fn scenarios(&self, submission_id: DbId) -> Result<Vec<Scenario>, PipelineError> {
        self.load(submission_id).await?;
        self.caps
            .scenarios
            .list(submission_id)
            .await
            .map_err(PipelineError::Storage)
    }

    /// Ledger entries for a driver, newest first.
    pub async fn driver_earnings(
        &self,
        driver_id: DbId,
    ) -> Result<Vec<EarningsEntry>, PipelineError> {
        self.caps
            .ledger
            .list_for_driver(driver_id)
            .await
            .map_err(PipelineError::Storage)
    }

    /// Drop leases left behind by crashed runs, then delete released
    /// leases older than the retention window.
    pub async fn sweep_leases(&self) -> Result<LeaseSweep, PipelineError> {
        let leases = &self.caps.leases;
        let expired = leases.sweep_expired().await.map_err(PipelineError::Storage)?;
        let purged = leases
            .purge_released(self.config.lease_retention)
            .await
            .map_err(PipelineError::Storage)?;
        Ok(LeaseSweep { expired, purged })
    }

    // -- preconditions --

    async fn load(&self, submission_id: DbId) -> Result<SubmissionRecord, PipelineError> {
        self.caps
            .submissions
            .get(submission_id)
            .await
            .map_err(PipelineError::Storage)?
            .ok_or(PipelineError::SubmissionNotFound(submission_id))
    }

    /// Everything that must hold before a run may start. Rejections here
    /// never enter the state machine and never reach the analyzer.
    async fn check_runnable(&self, submission_id: DbId) -> Result<SubmissionRecord, PipelineError> {
        let submission = self.load(submission_id).await?;
        if !submission.anonymized {
            tracing::info!(submission_id, "Rejected run on footage that is not anonymized");
            return Err(PipelineError::NotAnonymized(submission_id));
        }
        validate_duration(&submission)?;
        Ok(submission)
    }

    async fn acquire(&self, submission_id: DbId) -> Result<Lease, PipelineError> {
        let lease = self
            .caps
            .leases
            .acquire(submission_id, self.config.lease_ttl)
            .await
            .map_err(PipelineError::Storage)?;
        match lease {
            Some(lease) => Ok(lease),
            None => {
                tracing::info!(submission_id, "Pipeline already in progress");
                Err(PipelineError::AlreadyInProgress(submission_id))
            }
        }
    }

    /// Give the lease back. A failure here is logged and left to expiry;
    /// it never changes the outcome of the run.
    async fn release(&self, lease: &Lease) {
        match self.caps.leases.release(lease).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                submission_id = lease.submission_id,
                "Lease had already lapsed at release"
            ),
            Err(e) => tracing::error!(
                submission_id = lease.submission_id,
                error = %e,
                "Failed to release lease, leaving it to expire"
            ),
        }
    }

    async fn clear_scenarios(&self, submission_id: DbId) -> Result<u64, PipelineError> {
        let removed = self
            .caps
            .scenarios
            .delete_all(submission_id)
            .await
            .map_err(PipelineError::PersistenceFailed)?;
        tracing::info!(submission_id, removed, "Cleared scenarios");
        Ok(removed)
    }

    // -- reprice --

    async fn reprice_locked(
        &self,
        submission: &SubmissionRecord,
    ) -> Result<PipelineSummary, PipelineError> {
        let submission_id = submission.id;
        let stored = self
            .caps
            .scenarios
            .list(submission_id)
            .await
            .map_err(PipelineError::Storage)?;
        let extraction = Extraction::from_scenarios(stored);
        let value_score = self.score(submission, &extraction);
        let (estimate, supersedes) = self.price(submission, &extraction, value_score).await?;

        let entry = self
            .caps
            .ledger
            .append(submission_id, &estimate, supersedes)
            .await
            .map_err(PipelineError::PersistenceFailed)?;

        tracing::info!(
            submission_id,
            ledger_entry_id = entry.id,
            supersedes_id = ?supersedes,
            total = estimate.total,
            "Submission repriced"
        );

        Ok(PipelineSummary {
            submission_id,
            driver_id: submission.driver_id,
            scenarios: extraction.scenarios,
            edge_cases: extraction.edge_cases,
            value_score,
            estimated_earnings: estimate,
            ledger_entry_id: entry.id,
        })
    }

    // -- state machine --

    async fn run(
        &self,
        submission: &SubmissionRecord,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let mut tracker = RunTracker::new(submission.id);
        match self.drive(submission, cancel, &mut tracker).await {
            Ok(report) => Ok(report),
            Err(err) => {
                tracker.fail(&err);
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        submission: &SubmissionRecord,
        cancel: &CancellationToken,
        tracker: &mut RunTracker,
    ) -> Result<RunReport, PipelineError> {
        let submission_id = submission.id;

        tracker.advance(RunState::Analyzing, cancel)?;
        let (detections, analysis_attempts) = self.analyze(submission, cancel, tracker).await?;
        let dropped_detections = detections.unknown_labels + detections.malformed;

        tracker.advance(RunState::Extracting, cancel)?;
        let extraction = extraction::extract(&detections.events, &self.config.extraction);
        tracing::debug!(
            submission_id,
            events = detections.events.len(),
            scenarios = extraction.scenarios.len(),
            edge_cases = extraction.edge_cases.len(),
            "Extracted scenarios"
        );

        tracker.advance(RunState::Scoring, cancel)?;
        let value_score = self.score(submission, &extraction);

        tracker.advance(RunState::Pricing, cancel)?;
        let (estimate, supersedes) = self.price(submission, &extraction, value_score).await?;

        tracker.advance(RunState::Persisting, cancel)?;
        let entry = self.persist(submission_id, &extraction, &estimate, supersedes).await?;

        tracker.transitions.push(RunState::Completed);
        tracing::info!(
            submission_id,
            driver_id = submission.driver_id,
            scenarios = extraction.scenarios.len(),
            edge_cases = extraction.edge_cases.len(),
            value_score,
            total = estimate.total,
            ledger_entry_id = entry.id,
            "Pipeline run completed"
        );

        Ok(RunReport {
            summary: PipelineSummary {
                submission_id,
                driver_id: submission.driver_id,
                scenarios: extraction.scenarios,
                edge_cases: extraction.edge_cases,
                value_score,
                estimated_earnings: estimate,
                ledger_entry_id: entry.id,
            },
            transitions: std::mem::take(&mut tracker.transitions),
            analysis_attempts,
            dropped_detections,
        })
    }

    /// Call the analyzer with a per-attempt timeout, retrying transient
    /// failures with backoff.
    async fn analyze(
        &self,
        submission: &SubmissionRecord,
        cancel: &CancellationToken,
        tracker: &RunTracker,
    ) -> Result<(NormalizedDetections, u32), PipelineError> {
        let timeout = self.config.analysis.timeout;
        let analyzer = &self.caps.analyzer;
        let location = submission.footage_location.as_str();

        let outcome = retry_with_backoff(
            &self.config.retry,
            cancel,
            "video_analysis",
            AnalysisError::is_transient,
            || async move {
                match tokio::time::timeout(timeout, analyzer.analyze(location)).await {
                    Ok(result) => result,
                    Err(_) => Err(AnalysisError::Timeout(timeout)),
                }
            },
        )
        .await;

        match outcome {
            Ok(found) => Ok(found),
            Err(RetryError::Permanent { attempts, error })
            | Err(RetryError::Exhausted { attempts, error }) => Err(PipelineError::AnalysisFailed {
                attempts,
                source: error,
            }),
            Err(RetryError::Cancelled { .. }) => Err(tracker.cancelled()),
        }
    }

    fn score(&self, submission: &SubmissionRecord, extraction: &Extraction) -> f64 {
        value_score::score(
            submission.duration_secs,
            &extraction.scenarios,
            &extraction.edge_cases,
            &self.config.scoring,
        )
    }

    /// Price an extraction and look up the ledger entry the new one will
    /// supersede.
    async fn price(
        &self,
        submission: &SubmissionRecord,
        extraction: &Extraction,
        value_score: f64,
    ) -> Result<(EarningsResult, Option<DbId>), PipelineError> {
        let estimate = earnings::calculate(
            submission.duration_secs,
            &extraction.scenarios,
            &extraction.edge_cases,
            value_score,
            submission.driver_id,
            &self.config.earnings,
        )
        .map_err(PipelineError::InvalidInput)?;

        let supersedes = self
            .caps
            .ledger
            .latest_for_submission(submission.id)
            .await
            .map_err(PipelineError::Storage)?
            .map(|entry| entry.id);

        Ok((estimate, supersedes))
    }

    /// Replace the scenarios, then append the ledger entry. A failure of
    /// the second write is reported as partial persistence.
    async fn persist(
        &self,
        submission_id: DbId,
        extraction: &Extraction,
        estimate: &EarningsResult,
        supersedes: Option<DbId>,
    ) -> Result<EarningsEntry, PipelineError> {
        let written = self
            .caps
            .scenarios
            .replace_all(submission_id, &extraction.scenarios)
            .await
            .map_err(PipelineError::PersistenceFailed)?;
        tracing::debug!(submission_id, written, "Replaced scenarios");

        self.caps
            .ledger
            .append(submission_id, estimate, supersedes)
            .await
            .map_err(|source| {
                tracing::error!(
                    submission_id,
                    error = %source,
                    "Scenarios written but ledger append failed"
                );
                PipelineError::PartialPersistence {
                    written: PersistedHalf::Scenarios,
                    source,
                }
            })
    }
}

fn validate_duration(submission: &SubmissionRecord) -> Result<(), PipelineError> {
    let duration = submission.duration_secs;
    if !duration.is_finite() || duration < 0.0 {
        return Err(PipelineError::InvalidInput(CoreError::Validation(format!(
            "Submission {} has an invalid duration: {duration}",
            submission.id
        ))));
    }
    Ok(())
}
