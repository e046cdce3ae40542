//! Per-submission run leases.
//!
//! A lease is taken when a run is requested and given back on any
//! terminal state. Each lease carries an expiry so a crashed run cannot
//! lock a submission forever. [`PgLeaseManager`](crate::postgres::PgLeaseManager)
//! shares leases across processes; [`InMemoryLeaseManager`] covers a
//! single process.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashscore_core::types::DbId;
use tokio::sync::Mutex;

use crate::capabilities::{Lease, LeaseManager};
use crate::error::StoreError;

/// Generate an opaque holder token for a new lease.
pub fn new_holder_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Longest lease ever granted, whatever TTL is requested.
const MAX_LEASE_TTL_DAYS: i64 = 1;

/// Convert a TTL into a chrono duration, capped at [`MAX_LEASE_TTL_DAYS`].
pub(crate) fn ttl_to_chrono(ttl: Duration) -> chrono::Duration {
    let cap = chrono::Duration::days(MAX_LEASE_TTL_DAYS);
    chrono::Duration::from_std(ttl).map_or(cap, |d| d.min(cap))
}

/// Process-local lease table.
#[derive(Default)]
pub struct InMemoryLeaseManager {
    leases: Mutex<HashMap<DbId, Lease>>,
}

impl InMemoryLeaseManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a live lease currently exists for the submission.
    pub async fn is_held(&self, submission_id: DbId) -> bool {
        let leases = self.leases.lock().await;
        leases
            .get(&submission_id)
            .is_some_and(|l| l.expires_at > Utc::now())
    }
}

#[async_trait]
impl LeaseManager for InMemoryLeaseManager {
    async fn acquire(
        &self,
        submission_id: DbId,
        ttl: Duration,
    ) -> Result<Option<Lease>, StoreError> {
        let now = Utc::now();
        let mut leases = self.leases.lock().await;

        if let Some(existing) = leases.get(&submission_id) {
            if existing.expires_at > now {
                return Ok(None);
            }
            tracing::warn!(
                submission_id,
                holder = %existing.holder,
                "Taking over expired pipeline lease"
            );
        }

        let lease = Lease {
            submission_id,
            holder: new_holder_token(),
            expires_at: now + ttl_to_chrono(ttl),
        };
        leases.insert(submission_id, lease.clone());
        Ok(Some(lease))
    }

    async fn release(&self, lease: &Lease) -> Result<bool, StoreError> {
        let mut leases = self.leases.lock().await;
        match leases.get(&lease.submission_id) {
            Some(current) if current.holder == lease.holder => {
                leases.remove(&lease.submission_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn sweep_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut leases = self.leases.lock().await;
        let before = leases.len();
        leases.retain(|_, lease| lease.expires_at > now);
        Ok((before - leases.len()) as u64)
    }

    /// Released leases are removed on release, so nothing is retained.
    async fn purge_released(&self, _retention: Duration) -> Result<u64, StoreError> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn second_acquire_is_refused() {
        let manager = InMemoryLeaseManager::new();
        assert!(manager.acquire(1, TTL).await.unwrap().is_some());
        assert!(manager.acquire(1, TTL).await.unwrap().is_none());
        assert!(manager.is_held(1).await);
    }

    #[tokio::test]
    async fn different_submissions_do_not_contend() {
        let manager = InMemoryLeaseManager::new();
        assert!(manager.acquire(1, TTL).await.unwrap().is_some());
        assert!(manager.acquire(2, TTL).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn release_frees_the_submission() {
        let manager = InMemoryLeaseManager::new();
        let lease = manager.acquire(1, TTL).await.unwrap().unwrap();
        assert!(manager.release(&lease).await.unwrap());
        assert!(!manager.is_held(1).await);
        assert!(manager.acquire(1, TTL).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stale_holder_cannot_release_new_lease() {
        let manager = InMemoryLeaseManager::new();
        let stale = manager.acquire(1, Duration::ZERO).await.unwrap().unwrap();
        let fresh = manager.acquire(1, TTL).await.unwrap().unwrap();

        assert!(!manager.release(&stale).await.unwrap());
        assert!(manager.is_held(1).await);
        assert!(manager.release(&fresh).await.unwrap());
    }

    #[tokio::test]
    async fn sweep_drops_only_expired() {
        let manager = InMemoryLeaseManager::new();
        manager.acquire(1, Duration::ZERO).await.unwrap();
        manager.acquire(2, TTL).await.unwrap();

        assert_eq!(manager.sweep_expired().await.unwrap(), 1);
        assert!(manager.is_held(2).await);
    }

    #[test]
    fn holder_tokens_are_unique() {
        assert_ne!(new_holder_token(), new_holder_token());
    }
}
