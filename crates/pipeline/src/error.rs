//! Error types for the pipeline and its capabilities.
//!
//! Every [`PipelineError`] carries a stable [`ErrorKind`] code and a
//! [`RetryHint`] telling the caller whether re-requesting is safe.

use std::time::Duration;

use dashscore_core::error::CoreError;
use dashscore_core::types::DbId;
use serde::Serialize;

use crate::orchestrator::RunState;

/// Suggested wait before retrying after a transient analysis failure.
pub const ANALYSIS_RETRY_AFTER_SECS: u64 = 30;

/// Suggested wait before retrying while another run holds the lease.
pub const IN_PROGRESS_RETRY_AFTER_SECS: u64 = 5;

/// Suggested wait before retrying after a storage failure.
pub const STORAGE_RETRY_AFTER_SECS: u64 = 5;

// ---------------------------------------------------------------------------
// Capability errors
// ---------------------------------------------------------------------------

/// Failures from the video analysis service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AnalysisError {
    /// Transport failure, throttling or a 5xx from the service.
    #[error("Analysis service error: {0}")]
    Service(String),

    /// The service rejected our credentials.
    #[error("Analysis service rejected credentials: {0}")]
    Unauthorized(String),

    /// The footage could not be decoded.
    #[error("Unsupported footage format: {0}")]
    UnsupportedFormat(String),

    /// Any other client error, such as a location the service cannot resolve.
    #[error("Analysis service rejected the request: {0}")]
    Rejected(String),

    /// No response within the bounded window.
    #[error("Analysis service did not respond within {0:?}")]
    Timeout(Duration),
}

impl AnalysisError {
    /// Transient failures are retried with backoff; the rest fail fast.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Service(_) | Self::Timeout(_))
    }
}

/// Failures from the submission, scenario, ledger and lease stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be mapped back to the domain.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<CoreError> for StoreError {
    fn from(err: CoreError) -> Self {
        Self::Corrupt(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

/// Which half of the persistence step completed before the other failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistedHalf {
    Scenarios,
    Earnings,
}

/// Errors surfaced by the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Submission {0} not found")]
    SubmissionNotFound(DbId),

    #[error("Submission {0} has not been anonymized yet")]
    NotAnonymized(DbId),

    #[error("A pipeline run for submission {0} is already in progress")]
    AlreadyInProgress(DbId),

    #[error("Invalid input: {0}")]
    InvalidInput(#[source] CoreError),

    #[error("Video analysis failed after {attempts} attempt(s): {source}")]
    AnalysisFailed {
        attempts: u32,
        #[source]
        source: AnalysisError,
    },

    #[error("Run cancelled while {state}")]
    Cancelled { state: RunState },

    /// One persistence write landed and the other did not.
    #[error("Partial persistence: {written:?} written, the other write failed: {source}")]
    PartialPersistence {
        written: PersistedHalf,
        #[source]
        source: StoreError,
    },

    /// The first persistence write failed; nothing was written.
    #[error("Persistence failed: {0}")]
    PersistenceFailed(#[source] StoreError),

    /// A read against a store failed before any write was attempted.
    #[error("Storage error: {0}")]
    Storage(#[source] StoreError),
}

/// Stable, caller-visible error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    SubmissionNotFound,
    PreconditionFailed,
    AlreadyInProgress,
    InvalidInput,
    AnalysisUnavailable,
    AnalysisRejected,
    Cancelled,
    PartialPersistence,
    PersistenceFailed,
    StorageError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SubmissionNotFound => "SUBMISSION_NOT_FOUND",
            Self::PreconditionFailed => "PRECONDITION_FAILED",
            Self::AlreadyInProgress => "ALREADY_IN_PROGRESS",
            Self::InvalidInput => "INVALID_INPUT",
            Self::AnalysisUnavailable => "ANALYSIS_UNAVAILABLE",
            Self::AnalysisRejected => "ANALYSIS_REJECTED",
            Self::Cancelled => "CANCELLED",
            Self::PartialPersistence => "PARTIAL_PERSISTENCE",
            Self::PersistenceFailed => "PERSISTENCE_FAILED",
            Self::StorageError => "STORAGE_ERROR",
        }
    }
}

/// Whether, and how soon, a caller may repeat the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RetryHint {
    NotRetryable,
    RetryImmediately,
    BackOff { after_secs: u64 },
}

impl RetryHint {
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::NotRetryable)
    }

    pub fn after_secs(self) -> Option<u64> {
        match self {
            Self::BackOff { after_secs } => Some(after_secs),
            _ => None,
        }
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SubmissionNotFound(_) => ErrorKind::SubmissionNotFound,
            Self::NotAnonymized(_) => ErrorKind::PreconditionFailed,
            Self::AlreadyInProgress(_) => ErrorKind::AlreadyInProgress,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::AnalysisFailed { source, .. } if source.is_transient() => {
                ErrorKind::AnalysisUnavailable
            }
            Self::AnalysisFailed { .. } => ErrorKind::AnalysisRejected,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::PartialPersistence { .. } => ErrorKind::PartialPersistence,
            Self::PersistenceFailed(_) => ErrorKind::PersistenceFailed,
            Self::Storage(_) => ErrorKind::StorageError,
        }
    }

    pub fn retry_hint(&self) -> RetryHint {
        match self.kind() {
            ErrorKind::SubmissionNotFound
            | ErrorKind::PreconditionFailed
            | ErrorKind::InvalidInput
            | ErrorKind::AnalysisRejected => RetryHint::NotRetryable,
            ErrorKind::Cancelled | ErrorKind::PartialPersistence => RetryHint::RetryImmediately,
            ErrorKind::AlreadyInProgress => RetryHint::BackOff {
                after_secs: IN_PROGRESS_RETRY_AFTER_SECS,
            },
            ErrorKind::AnalysisUnavailable => RetryHint::BackOff {
                after_secs: ANALYSIS_RETRY_AFTER_SECS,
            },
            ErrorKind::PersistenceFailed | ErrorKind::StorageError => RetryHint::BackOff {
                after_secs: STORAGE_RETRY_AFTER_SECS,
            },
        }
    }

    /// Precondition failures are rejected before the state machine starts.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::SubmissionNotFound(_) | Self::NotAnonymized(_) | Self::AlreadyInProgress(_)
        )
    }
}
