//! Background job dispatcher.
//!
//! Polls the `generation_jobs` queue (or wakes early when nudged) and runs
//! claimed jobs through the pipeline, at most `concurrency` at a time. Uses
//! `SELECT FOR UPDATE SKIP LOCKED` via [`GenerationJobRepo::claim_next`] so
//! several dispatchers can share one database.

use std::sync::Arc;
use std::time::Duration;

use lullaby_db::models::generation_job::GenerationJob;
use lullaby_db::repositories::{GenerationJobRepo, StoryRepo};
use lullaby_db::DbPool;
use lullaby_pipeline::{ClaimedJob, Outcome, Pipeline};
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::cancellation::CancellationRegistry;
use crate::config::WorkerConfig;

/// Error written when the pipeline task panics.
pub const CRASH_MESSAGE: &str = "Generation crashed unexpectedly";

/// Error written when a claimed job's inputs cannot be read back.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load generation inputs";

/// Handle for waking the dispatcher as soon as a job is queued.
#[derive(Clone, Default)]
pub struct JobNotifier {
    notify: Arc<Notify>,
}

impl JobNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        self.notify.notify_one();
    }
}

/// Bounded worker pool over the durable job queue.
pub struct JobDispatcher {
    pool: DbPool,
    pipeline: Arc<Pipeline>,
    registry: Arc<CancellationRegistry>,
    notifier: JobNotifier,
    permits: Arc<Semaphore>,
    tasks: TaskTracker,
    poll_interval: Duration,
    shutdown_grace: Duration,
}

impl JobDispatcher {
    pub fn new(
        pool: DbPool,
        pipeline: Arc<Pipeline>,
        registry: Arc<CancellationRegistry>,
        notifier: JobNotifier,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            pool,
            pipeline,
            registry,
            notifier,
            permits: Arc::new(Semaphore::new(config.concurrency)),
            tasks: TaskTracker::new(),
            poll_interval: config.poll_interval,
            shutdown_grace: config.shutdown_grace,
        }
    }

    /// Run the dispatcher loop until the cancellation token is triggered,
    /// then drain in-flight jobs.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            concurrency = self.permits.available_permits(),
            "Job dispatcher started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Job dispatcher shutting down");
                    break;
                }
                _ = ticker.tick() => {}
                _ = self.notifier.notify.notified() => {}
            }

            if let Err(e) = self.dispatch_pending().await {
                tracing::error!(error = %e, "Dispatch cycle failed");
            }
        }

        self.drain().await;
    }

    /// One dispatch cycle: claim and start jobs while permits are free.
    ///
    /// Returns the number of jobs started.
    pub async fn dispatch_pending(&self) -> Result<usize, sqlx::Error> {
        let mut started = 0;

        while let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() {
            let Some(job) = GenerationJobRepo::claim_next(&self.pool).await? else {
                break;
            };
            tracing::info!(
                story_id = job.story_id,
                attempt = job.attempt,
                "Job claimed",
            );
            self.start(job, permit).await?;
            started += 1;
        }

        Ok(started)
    }

    /// Spawn the pipeline for a claimed job under a supervising task that
    /// holds the permit and converts a panic into an error write.
    async fn start(&self, job: GenerationJob, permit: OwnedSemaphorePermit) -> Result<(), sqlx::Error> {
        let story_id = job.story_id;
        let attempt = job.attempt;

        // The row is already claimed; every early return must leave it terminal.
        let claimed = match self.load(job).await {
            Ok(Ok(claimed)) => claimed,
            Ok(Err(message)) => {
                tracing::error!(story_id, attempt, error = %message, "Cannot start job");
                self.pipeline.record_failure(story_id, attempt, &message).await;
                return Ok(());
            }
            Err(e) => {
                tracing::error!(story_id, attempt, error = %e, "Failed to load claimed job");
                self.pipeline
                    .record_failure(story_id, attempt, LOAD_FAILED_MESSAGE)
                    .await;
                return Err(e);
            }
        };

        let token = self.registry.register(story_id, attempt);
        let pipeline = Arc::clone(&self.pipeline);
        let handle = tokio::spawn(async move { pipeline.run(&claimed, &token).await });

        let pipeline = Arc::clone(&self.pipeline);
        let registry = Arc::clone(&self.registry);
        self.tasks.spawn(async move {
            let _permit = permit;
            match handle.await {
                Ok(Outcome::Completed) => {}
                Ok(outcome) => {
                    tracing::debug!(story_id, attempt, ?outcome, "Job finished without completing");
                }
                Err(e) => {
                    tracing::error!(story_id, attempt, error = %e, "Generation task crashed");
                    pipeline.record_failure(story_id, attempt, CRASH_MESSAGE).await;
                }
            }
            registry.remove(story_id, attempt);
        });

        Ok(())
    }

    /// Decode the claimed job's parameters and load its images.
    ///
    /// The inner `Err` is a message to record on the job.
    async fn load(&self, job: GenerationJob) -> Result<Result<ClaimedJob, String>, sqlx::Error> {
        let parameters = match job.story_parameters() {
            Ok(parameters) => parameters,
            Err(e) => return Ok(Err(e.to_string())),
        };
        let images = StoryRepo::find_by_id(&self.pool, job.story_id)
            .await?
            .map(|story| story.images())
            .unwrap_or_default();

        Ok(Ok(ClaimedJob {
            story_id: job.story_id,
            attempt: job.attempt,
            parameters,
            images,
        }))
    }

    /// Let in-flight jobs finish within the grace period, then cancel them.
    async fn drain(&self) {
        self.tasks.close();
        let in_flight = self.tasks.len();
        if in_flight == 0 {
            return;
        }

        tracing::info!(
            in_flight,
            grace_secs = self.shutdown_grace.as_secs(),
            "Waiting for in-flight generations",
        );
        if tokio::time::timeout(self.shutdown_grace, self.tasks.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.tasks.len(),
                "Shutdown grace period elapsed, cancelling generations",
            );
            self.registry.cancel_all();
            self.tasks.wait().await;
        }
        tracing::info!("Job dispatcher drained");
    }
}
