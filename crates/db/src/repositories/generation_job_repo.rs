//! Repository for the `generation_jobs` table.
//!
//! The table is also the durable work queue: pending rows are claimed by
//! dispatchers with `FOR UPDATE SKIP LOCKED`. Every write that belongs to a
//! running attempt is guarded by `attempt`, so a superseded worker can never
//! overwrite a newer attempt's state.

use lullaby_core::steps::{GenerationStep, PROGRESS_COMPLETED};
use lullaby_core::story::StoryParameters;
use lullaby_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::generation_job::GenerationJob;
use crate::models::status::JobStatus;

/// Column list for `generation_jobs` queries.
const COLUMNS: &str = "\
    story_id, status_id, progress, current_step, error_message, parameters, \
    attempt, started_at, completed_at, created_at, updated_at";

/// Provides state transitions for generation jobs.
pub struct GenerationJobRepo;

impl GenerationJobRepo {
    /// Find the job for a story.
    pub async fn find_by_story(
        pool: &PgPool,
        story_id: DbId,
    ) -> Result<Option<GenerationJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generation_jobs WHERE story_id = $1");
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(story_id)
            .fetch_optional(pool)
            .await
    }

    /// Atomically claim the longest-waiting pending job.
    ///
    /// Moves it to `generating`, bumps `attempt` and stamps `started_at`.
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent dispatchers never
    /// claim the same row.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<GenerationJob>, sqlx::Error> {
        let query = format!(
            "UPDATE generation_jobs \
             SET status_id = $1, attempt = attempt + 1, started_at = NOW(), \
                 completed_at = NULL, updated_at = NOW() \
             WHERE story_id = ( \
                 SELECT story_id FROM generation_jobs \
                 WHERE status_id = $2 \
                 ORDER BY updated_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(JobStatus::Generating.id())
            .bind(JobStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Record a stage transition for a running attempt.
    ///
    /// Applies only while the job is `generating` under the same attempt and
    /// the new progress does not go backwards. Returns `false` when the guard
    /// rejected the write.
    pub async fn update_progress(
        pool: &PgPool,
        story_id: DbId,
        attempt: i32,
        step: GenerationStep,
        progress: i16,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_jobs \
             SET current_step = $3, progress = $4, updated_at = NOW() \
             WHERE story_id = $1 AND attempt = $2 AND status_id = $5 AND progress <= $4",
        )
        .bind(story_id)
        .bind(attempt)
        .bind(step.as_str())
        .bind(progress)
        .bind(JobStatus::Generating.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a running attempt as completed at 100%.
    pub async fn complete(
        pool: &PgPool,
        story_id: DbId,
        attempt: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_jobs \
             SET status_id = $3, current_step = $4, progress = $5, \
                 error_message = NULL, completed_at = NOW(), updated_at = NOW() \
             WHERE story_id = $1 AND attempt = $2 AND status_id = $6",
        )
        .bind(story_id)
        .bind(attempt)
        .bind(JobStatus::Completed.id())
        .bind(GenerationStep::Completed.as_str())
        .bind(PROGRESS_COMPLETED)
        .bind(JobStatus::Generating.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a running attempt as failed. Progress is left where it was.
    ///
    /// No automatic retry is performed. The job stays in `error` until the
    /// user explicitly retries it.
    pub async fn fail(
        pool: &PgPool,
        story_id: DbId,
        attempt: i32,
        message: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_jobs \
             SET status_id = $3, current_step = $4, error_message = $5, \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE story_id = $1 AND attempt = $2 AND status_id = $6",
        )
        .bind(story_id)
        .bind(attempt)
        .bind(JobStatus::Error.id())
        .bind(GenerationStep::Error.as_str())
        .bind(message)
        .bind(JobStatus::Generating.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a job that was never claimed straight to `error`.
    ///
    /// Returns `false` if the job is no longer pending.
    pub async fn fail_pending(
        pool: &PgPool,
        story_id: DbId,
        message: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_jobs \
             SET status_id = $2, current_step = $3, error_message = $4, \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE story_id = $1 AND status_id = $5",
        )
        .bind(story_id)
        .bind(JobStatus::Error.id())
        .bind(GenerationStep::Error.as_str())
        .bind(message)
        .bind(JobStatus::Pending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Reset a terminal job to `pending` and clear its story's generated
    /// content, in one statement.
    ///
    /// When `parameters` is `Some` they replace the stored ones. Returns
    /// `None` if the job does not exist or is not terminal.
    pub async fn reset_for_retry(
        pool: &PgPool,
        story_id: DbId,
        parameters: Option<&StoryParameters>,
    ) -> Result<Option<GenerationJob>, sqlx::Error> {
        let query = format!(
            "WITH job AS ( \
                 UPDATE generation_jobs \
                 SET status_id = $2, progress = 0, current_step = $3, \
                     error_message = NULL, started_at = NULL, completed_at = NULL, \
                     parameters = COALESCE($4, parameters), updated_at = NOW() \
                 WHERE story_id = $1 AND status_id IN ($5, $6) \
                 RETURNING {COLUMNS} \
             ), cleared AS ( \
                 UPDATE stories \
                 SET title = NULL, text_content = NULL, audio_url = NULL, \
                     word_count = NULL, updated_at = NOW() \
                 WHERE id IN (SELECT story_id FROM job) \
             ) \
             SELECT {COLUMNS} FROM job"
        );
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(story_id)
            .bind(JobStatus::Pending.id())
            .bind(GenerationStep::StoryGeneration.as_str())
            .bind(parameters.map(Json))
            .bind(JobStatus::Completed.id())
            .bind(JobStatus::Error.id())
            .fetch_optional(pool)
            .await
    }

    /// Fail every `generating` job that has not been written to for
    /// `threshold_secs` seconds. Returns the affected story ids.
    pub async fn fail_stale(
        pool: &PgPool,
        threshold_secs: i64,
        message: &str,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "UPDATE generation_jobs \
             SET status_id = $1, current_step = $2, error_message = $3, \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE status_id = $4 \
               AND updated_at < NOW() - make_interval(secs => $5) \
             RETURNING story_id",
        )
        .bind(JobStatus::Error.id())
        .bind(GenerationStep::Error.as_str())
        .bind(message)
        .bind(JobStatus::Generating.id())
        .bind(threshold_secs as f64)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
