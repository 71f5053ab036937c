//! Periodic sync passes.
//!
//! Runs one pass immediately, then one per interval, until `cancel` fires.
//! A pass that is still running when the token fires is allowed to finish.

use std::future::Future;
use std::time::Duration;

use medwatch_pipeline::{SyncError, SyncOrchestrator};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Default time between two passes: one hour.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3600);

/// Invoke `pass` on every tick until cancelled.
pub async fn run_every<F, Fut>(period: Duration, cancel: CancellationToken, mut pass: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period);
    // A pass longer than the period must not trigger a burst of catch-up passes.
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Sync scheduler stopping");
                break;
            }
            _ = interval.tick() => pass().await,
        }
    }
}

/// One scheduled pass. Failures are logged; the scheduler keeps going.
pub async fn run_pass(orchestrator: &SyncOrchestrator) {
    match orchestrator.run_once().await {
        Ok(summary) => tracing::info!(
            sync_run_id = summary.sync_run_id,
            duration_ms = summary.duration_ms,
            status_changes = summary.status_changes(),
            notifications = summary.notifications_succeeded,
            errors = summary.errors.len(),
            "Scheduled sync finished",
        ),
        Err(SyncError::AlreadyRunning) => {
            tracing::info!("Another sync run is in progress, skipping this tick");
        }
        Err(e) => tracing::error!(error = %e, "Scheduled sync failed"),
    }
}
