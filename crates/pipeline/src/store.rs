//! The status store seam between the orchestrator and persistence.
//!
//! Every write is scoped to one attempt. A write returning `Ok(false)` means
//! the guard rejected it: the job no longer belongs to that attempt.

use async_trait::async_trait;
use lullaby_core::retry::{retry_with_backoff, RetryPolicy};
use lullaby_core::steps::GenerationStep;
use lullaby_core::types::DbId;
use lullaby_db::repositories::{GenerationJobRepo, StoryRepo};
use lullaby_db::DbPool;

use crate::error::StoreError;

#[async_trait]
pub trait GenerationStore: Send + Sync {
    async fn record_progress(
        &self,
        story_id: DbId,
        attempt: i32,
        step: GenerationStep,
        progress: i16,
    ) -> Result<bool, StoreError>;

    async fn save_title(&self, story_id: DbId, attempt: i32, title: &str)
        -> Result<bool, StoreError>;

    async fn save_text(
        &self,
        story_id: DbId,
        attempt: i32,
        text: &str,
        word_count: usize,
    ) -> Result<bool, StoreError>;

    async fn save_audio_url(
        &self,
        story_id: DbId,
        attempt: i32,
        audio_url: &str,
    ) -> Result<bool, StoreError>;

    async fn complete(&self, story_id: DbId, attempt: i32) -> Result<bool, StoreError>;

    async fn fail(&self, story_id: DbId, attempt: i32, message: &str)
        -> Result<bool, StoreError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

/// [`GenerationStore`] backed by the `lullaby-db` repositories, with
/// bounded backoff retries around every write.
pub struct PgGenerationStore {
    pool: DbPool,
    retry: RetryPolicy,
}

impl PgGenerationStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
        }
    }
}

#[async_trait]
impl GenerationStore for PgGenerationStore {
    async fn record_progress(
        &self,
        story_id: DbId,
        attempt: i32,
        step: GenerationStep,
        progress: i16,
    ) -> Result<bool, StoreError> {
        Ok(retry_with_backoff(&self.retry, "record_progress", || {
            GenerationJobRepo::update_progress(&self.pool, story_id, attempt, step, progress)
        })
        .await?)
    }

    async fn save_title(
        &self,
        story_id: DbId,
        attempt: i32,
        title: &str,
    ) -> Result<bool, StoreError> {
        Ok(retry_with_backoff(&self.retry, "save_title", || {
            StoryRepo::set_title(&self.pool, story_id, attempt, title)
        })
        .await?)
    }

    async fn save_text(
        &self,
        story_id: DbId,
        attempt: i32,
        text: &str,
        word_count: usize,
    ) -> Result<bool, StoreError> {
        let word_count = i32::try_from(word_count).unwrap_or(i32::MAX);
        Ok(retry_with_backoff(&self.retry, "save_text", || {
            StoryRepo::set_text(&self.pool, story_id, attempt, text, word_count)
        })
        .await?)
    }

    async fn save_audio_url(
        &self,
        story_id: DbId,
        attempt: i32,
        audio_url: &str,
    ) -> Result<bool, StoreError> {
        Ok(retry_with_backoff(&self.retry, "save_audio_url", || {
            StoryRepo::set_audio_url(&self.pool, story_id, attempt, audio_url)
        })
        .await?)
    }

    async fn complete(&self, story_id: DbId, attempt: i32) -> Result<bool, StoreError> {
        Ok(retry_with_backoff(&self.retry, "complete", || {
            GenerationJobRepo::complete(&self.pool, story_id, attempt)
        })
        .await?)
    }

    async fn fail(
        &self,
        story_id: DbId,
        attempt: i32,
        message: &str,
    ) -> Result<bool, StoreError> {
        Ok(retry_with_backoff(&self.retry, "fail", || {
            GenerationJobRepo::fail(&self.pool, story_id, attempt, message)
        })
        .await?)
    }
}
