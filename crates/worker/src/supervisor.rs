//! Periodic sweep of stuck generations.
//!
//! A `generating` job whose row has not been written for longer than the
//! threshold has lost its worker (crash, restart, hung provider). It is
//! marked as failed so the user can retry it; nothing is re-run
//! automatically.

use std::time::Duration;

use lullaby_core::types::DbId;
use lullaby_db::repositories::GenerationJobRepo;
use lullaby_db::DbPool;
use tokio_util::sync::CancellationToken;

use crate::cancellation::CancellationRegistry;

/// Error written on a swept job.
pub const STALLED_MESSAGE: &str = "Generation stalled and was abandoned";

/// Run the stuck-job sweep loop until `cancel` is triggered.
pub async fn run(
    pool: DbPool,
    registry: std::sync::Arc<CancellationRegistry>,
    threshold: Duration,
    check_interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        threshold_secs = threshold.as_secs(),
        interval_secs = check_interval.as_secs(),
        "Stale job supervisor started",
    );

    let mut interval = tokio::time::interval(check_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Stale job supervisor stopping");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = sweep(&pool, &registry, threshold).await {
                    tracing::error!(error = %e, "Stale job sweep failed");
                }
            }
        }
    }
}

/// Fail every stuck job and signal any local task still attached to one.
pub async fn sweep(
    pool: &DbPool,
    registry: &CancellationRegistry,
    threshold: Duration,
) -> Result<Vec<DbId>, sqlx::Error> {
    let threshold_secs = i64::try_from(threshold.as_secs()).unwrap_or(i64::MAX);
    let failed = GenerationJobRepo::fail_stale(pool, threshold_secs, STALLED_MESSAGE).await?;

    if failed.is_empty() {
        tracing::debug!("No stale jobs");
    } else {
        for story_id in &failed {
            registry.cancel(*story_id);
        }
        tracing::warn!(count = failed.len(), story_ids = ?failed, "Marked stale jobs as failed");
    }

    Ok(failed)
}
