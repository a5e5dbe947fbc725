//! Repository for the `stories` table.

use lullaby_core::steps::GenerationStep;
use lullaby_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::generation_job::GenerationJob;
use crate::models::status::JobStatus;
use crate::models::story::{CreateStory, Story};

/// Column list for `stories` queries.
const COLUMNS: &str = "\
    id, title, text_content, audio_url, word_count, uploaded_images, \
    created_at, updated_at";

/// Column list for the `generation_jobs` row returned on create.
const JOB_COLUMNS: &str = "\
    story_id, status_id, progress, current_step, error_message, parameters, \
    attempt, started_at, completed_at, created_at, updated_at";

/// Guard shared by content writes. Binds: `$1` story id, `$2` attempt,
/// `$4` generating status id.
const OWNED_BY_ATTEMPT: &str = "\
    EXISTS (SELECT 1 FROM generation_jobs j \
            WHERE j.story_id = $1 AND j.attempt = $2 AND j.status_id = $4)";

/// Provides CRUD operations for story content.
pub struct StoryRepo;

impl StoryRepo {
    /// Insert a story and its pending generation job in one statement.
    ///
    /// Returns the job row; its `story_id` is the new story's id.
    pub async fn create_with_job(
        pool: &PgPool,
        input: &CreateStory,
    ) -> Result<GenerationJob, sqlx::Error> {
        let query = format!(
            "WITH story AS ( \
                 INSERT INTO stories (uploaded_images) VALUES ($1) RETURNING id \
             ) \
             INSERT INTO generation_jobs (story_id, status_id, progress, current_step, parameters) \
             SELECT id, $2, 0, $3, $4 FROM story \
             RETURNING {JOB_COLUMNS}"
        );
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(Json(&input.uploaded_images))
            .bind(JobStatus::Pending.id())
            .bind(GenerationStep::StoryGeneration.as_str())
            .bind(Json(&input.parameters))
            .fetch_one(pool)
            .await
    }

    /// Find a story by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Story>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM stories WHERE id = $1");
        sqlx::query_as::<_, Story>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Persist the generated title.
    ///
    /// Content writes apply only while `attempt` still owns a `generating`
    /// job, so a superseded attempt cannot overwrite a newer one's output.
    pub async fn set_title(
        pool: &PgPool,
        id: DbId,
        attempt: i32,
        title: &str,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE stories SET title = $3, updated_at = NOW() \
             WHERE id = $1 AND {OWNED_BY_ATTEMPT}"
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(attempt)
            .bind(title)
            .bind(JobStatus::Generating.id())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Persist the generated story text and its word count.
    pub async fn set_text(
        pool: &PgPool,
        id: DbId,
        attempt: i32,
        text: &str,
        word_count: i32,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE stories SET text_content = $3, word_count = $5, updated_at = NOW() \
             WHERE id = $1 AND {OWNED_BY_ATTEMPT}"
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(attempt)
            .bind(text)
            .bind(JobStatus::Generating.id())
            .bind(word_count)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Persist the narrated audio URL.
    pub async fn set_audio_url(
        pool: &PgPool,
        id: DbId,
        attempt: i32,
        audio_url: &str,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE stories SET audio_url = $3, updated_at = NOW() \
             WHERE id = $1 AND {OWNED_BY_ATTEMPT}"
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(attempt)
            .bind(audio_url)
            .bind(JobStatus::Generating.id())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a story. Its generation job cascades.
    ///
    /// Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM stories WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
