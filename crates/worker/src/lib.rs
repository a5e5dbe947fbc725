//! Generation worker pool: claims queued jobs, runs them through the
//! pipeline, and sweeps jobs whose worker went away.
//!
//! Runs standalone (`lullaby-worker`) or embedded in the API process.

pub mod cancellation;
pub mod config;
pub mod dispatcher;
pub mod shutdown;
pub mod supervisor;

use std::sync::Arc;

use lullaby_db::DbPool;
use lullaby_pipeline::Pipeline;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cancellation::CancellationRegistry;
use crate::config::WorkerConfig;
use crate::dispatcher::{JobDispatcher, JobNotifier};

/// Running dispatcher and supervisor tasks.
pub struct WorkerHandle {
    cancel: CancellationToken,
    dispatcher: JoinHandle<()>,
    supervisor: JoinHandle<()>,
}

/// Start the dispatcher and stale-job supervisor on the current runtime.
pub fn spawn(
    pool: DbPool,
    pipeline: Arc<Pipeline>,
    registry: Arc<CancellationRegistry>,
    notifier: JobNotifier,
    config: &WorkerConfig,
) -> WorkerHandle {
    let cancel = CancellationToken::new();

    let dispatcher = JobDispatcher::new(
        pool.clone(),
        pipeline,
        Arc::clone(&registry),
        notifier,
        config,
    );
    let dispatcher_cancel = cancel.clone();
    let dispatcher = tokio::spawn(async move { dispatcher.run(dispatcher_cancel).await });

    let supervisor = tokio::spawn(supervisor::run(
        pool,
        registry,
        config.stale_threshold,
        config.stale_check_interval,
        cancel.clone(),
    ));

    WorkerHandle {
        cancel,
        dispatcher,
        supervisor,
    }
}

impl WorkerHandle {
    /// Stop claiming work and wait for in-flight generations to drain.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.supervisor.await {
            tracing::error!(error = %e, "Supervisor task ended abnormally");
        }
        if let Err(e) = self.dispatcher.await {
            tracing::error!(error = %e, "Dispatcher task ended abnormally");
        }
        tracing::info!("Worker stopped");
    }
}
