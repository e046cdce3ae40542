//! Periodic cleanup of expired pipeline leases.
//!
//! A run that crashes never releases its lease. Acquisition already takes
//! over expired leases, so this sweep makes stale holders visible in the
//! logs and deletes released leases once they pass the retention window.

use std::sync::Arc;
use std::time::Duration;

use dashscore_pipeline::orchestrator::Orchestrator;
use tokio_util::sync::CancellationToken;

/// Run the sweep loop every `interval` until `cancel` is triggered.
pub async fn run(orchestrator: Arc<Orchestrator>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Lease sweeper started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Lease sweeper stopping");
                break;
            }
            _ = ticker.tick() => {
                match orchestrator.sweep_leases().await {
                    Ok(sweep) => {
                        if sweep.expired > 0 {
                            tracing::warn!(
                                expired = sweep.expired,
                                "Lease sweep: expired leases released"
                            );
                        }
                        if sweep.purged > 0 {
                            tracing::info!(
                                purged = sweep.purged,
                                "Lease sweep: old leases deleted"
                            );
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "Lease sweep failed"),
                }
            }
        }
    }
}
