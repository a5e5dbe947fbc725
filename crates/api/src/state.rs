use std::sync::Arc;

use lullaby_core::retry::RetryPolicy;
use lullaby_pipeline::providers::AssetStorage;
use lullaby_worker::cancellation::CancellationRegistry;
use lullaby_worker::dispatcher::JobNotifier;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone; everything is behind an `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: lullaby_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Where uploaded images are stored.
    pub storage: Arc<dyn AssetStorage>,
    /// Wakes the dispatcher when a job is queued.
    pub notifier: JobNotifier,
    /// Cancellation tokens of generations running in this process.
    pub registry: Arc<CancellationRegistry>,
    /// Backoff applied to status reads.
    pub status_retry: RetryPolicy,
}
