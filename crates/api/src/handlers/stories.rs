//! Handlers for the `/stories` resource.
//!
//! Creating or retrying a story only queues its generation job; a worker
//! picks it up and the client follows along on the status endpoint.

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::{CACHE_CONTROL, EXPIRES, PRAGMA};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use lullaby_core::analysis::ImageAsset;
use lullaby_core::error::CoreError;
use lullaby_core::retry::retry_with_backoff;
use lullaby_core::steps::PublicStep;
use lullaby_core::story::StoryParameters;
use lullaby_core::types::{DbId, Timestamp};
use lullaby_db::models::generation_job::GenerationJob;
use lullaby_db::models::status::JobStatus;
use lullaby_db::models::story::CreateStory;
use lullaby_db::repositories::{GenerationJobRepo, StoryRepo};
use lullaby_pipeline::audio::audio_key;
use lullaby_pipeline::error::PipelineError;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;
use crate::uploads::{self, ImageUpload};

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Body returned when a generation is queued.
#[derive(Debug, Serialize)]
pub struct QueuedStory {
    pub story_id: DbId,
    pub status: JobStatus,
}

/// Query string of the status endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    /// Progress the client last observed. A lower read is treated as stale.
    pub expected_progress: Option<i16>,
}

/// Body of the status endpoint. Not wrapped in the data envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: JobStatus,
    pub progress: i16,
    pub current_step: PublicStep,
    pub error: Option<String>,
    pub completed: bool,
    pub timestamp: Timestamp,
}

/// Story content together with its generation state.
#[derive(Debug, Serialize)]
pub struct StoryDetail {
    pub id: DbId,
    pub title: Option<String>,
    pub text_content: Option<String>,
    pub audio_url: Option<String>,
    pub word_count: Option<i32>,
    pub images: Vec<ImageAsset>,
    pub status: JobStatus,
    pub progress: i16,
    pub current_step: PublicStep,
    pub error_message: Option<String>,
    pub attempt: i32,
    pub parameters: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn story_not_found(story_id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Story",
        id: story_id,
    })
}

async fn find_job(state: &AppState, story_id: DbId) -> AppResult<GenerationJob> {
    GenerationJobRepo::find_by_story(&state.pool, story_id)
        .await?
        .ok_or_else(|| story_not_found(story_id))
}

/// Read a job's status with transient-failure retries. When the caller
/// supplies the progress it last saw and the read is lower, re-read under
/// the same backoff; once attempts run out the latest read is returned.
async fn read_status(
    state: &AppState,
    story_id: DbId,
    expected_progress: Option<i16>,
) -> AppResult<GenerationJob> {
    let policy = &state.status_retry;
    let read = || GenerationJobRepo::find_by_story(&state.pool, story_id);

    let mut job = retry_with_backoff(policy, "status read", read)
        .await?
        .ok_or_else(|| story_not_found(story_id))?;

    let Some(expected) = expected_progress else {
        return Ok(job);
    };

    let mut delay = policy.initial_delay;
    for attempt in 1..policy.max_attempts {
        if job.progress >= expected {
            break;
        }
        tracing::debug!(
            story_id,
            attempt,
            progress = job.progress,
            expected,
            "Progress behind expected value, re-reading",
        );
        tokio::time::sleep(delay).await;
        delay = policy.next_delay(delay);
        job = retry_with_backoff(policy, "status read", read)
            .await?
            .ok_or_else(|| story_not_found(story_id))?;
    }

    if job.progress < expected {
        tracing::warn!(
            story_id,
            progress = job.progress,
            expected,
            "Returning status still behind expected progress",
        );
    }
    Ok(job)
}

/// Parse an optional JSON body of fresh story parameters.
fn parse_optional_parameters(body: &Bytes) -> AppResult<Option<StoryParameters>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let parameters: StoryParameters = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid story parameters: {e}")))?;
    parameters.validate()?;
    Ok(Some(parameters))
}

/// Fail the story's job if it is generating, signalling any local task.
async fn cancel_generating(state: &AppState, story_id: DbId) -> AppResult<bool> {
    let Some(job) = GenerationJobRepo::find_by_story(&state.pool, story_id).await? else {
        return Ok(false);
    };
    if job.status()? != JobStatus::Generating {
        return Ok(false);
    }
    state.registry.cancel(story_id);
    let message = PipelineError::Cancelled.to_string();
    Ok(GenerationJobRepo::fail(&state.pool, story_id, job.attempt, &message).await?)
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /api/v1/stories
///
/// Multipart body: a `params` field with the story parameters as JSON and
/// up to `MAX_UPLOAD_IMAGES` `images` files. Returns 202 once the job is
/// queued.
pub async fn create_story(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut parameters: Option<StoryParameters> = None;
    let mut images: Vec<ImageUpload> = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("params") => {
                let raw = field.text().await?;
                let parsed = serde_json::from_str(&raw)
                    .map_err(|e| AppError::BadRequest(format!("Invalid story parameters: {e}")))?;
                parameters = Some(parsed);
            }
            Some("images") => {
                if images.len() >= state.config.max_upload_images {
                    return Err(AppError::BadRequest(format!(
                        "At most {} images are allowed",
                        state.config.max_upload_images
                    )));
                }
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await?;
                images.push(ImageUpload::sniff(bytes.to_vec(), file_name.as_deref())?);
            }
            other => tracing::debug!(field = ?other, "Ignoring unknown multipart field"),
        }
    }

    let parameters =
        parameters.ok_or_else(|| AppError::BadRequest("Missing 'params' field".into()))?;
    parameters.validate()?;

    let uploaded_images = uploads::store_all(state.storage.as_ref(), images).await?;
    let input = CreateStory {
        parameters,
        uploaded_images,
    };

    let job = match StoryRepo::create_with_job(&state.pool, &input).await {
        Ok(job) => job,
        Err(e) => {
            let keys: Vec<&str> = input.uploaded_images.iter().map(|a| a.key.as_str()).collect();
            uploads::remove_all(state.storage.as_ref(), keys).await;
            return Err(e.into());
        }
    };
    state.notifier.notify();

    tracing::info!(
        story_id = job.story_id,
        images = input.uploaded_images.len(),
        duration_tier = %input.parameters.duration_tier,
        "Story queued",
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: QueuedStory {
                story_id: job.story_id,
                status: JobStatus::Pending,
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /api/v1/stories/{id}/status
///
/// Current generation status in the public step vocabulary. Never cached.
pub async fn get_status(
    State(state): State<AppState>,
    Path(story_id): Path<DbId>,
    Query(query): Query<StatusQuery>,
) -> AppResult<impl IntoResponse> {
    let job = read_status(&state, story_id, query.expected_progress).await?;
    let status = job.status()?;

    let body = StatusResponse {
        status,
        progress: job.progress,
        current_step: job.step()?.public(),
        error: job.error_message,
        completed: status == JobStatus::Completed,
        timestamp: job.updated_at,
    };

    Ok((
        [
            (CACHE_CONTROL, "no-store, no-cache, must-revalidate, max-age=0"),
            (PRAGMA, "no-cache"),
            (EXPIRES, "0"),
        ],
        Json(body),
    ))
}

/// GET /api/v1/stories/{id}
pub async fn get_story(
    State(state): State<AppState>,
    Path(story_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let story = StoryRepo::find_by_id(&state.pool, story_id)
        .await?
        .ok_or_else(|| story_not_found(story_id))?;
    let job = find_job(&state, story_id).await?;
    let images = story.images();

    Ok(Json(DataResponse {
        data: StoryDetail {
            id: story.id,
            title: story.title,
            text_content: story.text_content,
            audio_url: story.audio_url,
            word_count: story.word_count,
            images,
            status: job.status()?,
            progress: job.progress,
            current_step: job.step()?.public(),
            error_message: job.error_message,
            attempt: job.attempt,
            parameters: job.parameters,
            created_at: story.created_at,
            updated_at: job.updated_at.max(story.updated_at),
        },
    }))
}

// ---------------------------------------------------------------------------
// Retry / cancel / delete
// ---------------------------------------------------------------------------

/// POST /api/v1/stories/{id}/retry
///
/// Re-queue a completed or failed story from the first stage. An optional
/// JSON body replaces the stored parameters. 409 while still running.
pub async fn retry_story(
    State(state): State<AppState>,
    Path(story_id): Path<DbId>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let parameters = parse_optional_parameters(&body)?;
    let job = find_job(&state, story_id).await?;

    if !job.status()?.is_terminal() {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Story {story_id} is still being generated"
        ))));
    }

    let reset = GenerationJobRepo::reset_for_retry(&state.pool, story_id, parameters.as_ref())
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Conflict(format!(
                "Story {story_id} is still being generated"
            )))
        })?;
    state.notifier.notify();

    if job.attempt > 0 {
        uploads::remove_all(
            state.storage.as_ref(),
            [audio_key(story_id, job.attempt).as_str()],
        )
        .await;
    }

    tracing::info!(
        story_id,
        previous_attempt = job.attempt,
        new_parameters = parameters.is_some(),
        "Story re-queued",
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: QueuedStory {
                story_id: reset.story_id,
                status: JobStatus::Pending,
            },
        }),
    ))
}

/// POST /api/v1/stories/{id}/cancel
///
/// Stop a pending or running generation; the job ends in `error`. 409 when
/// it already finished.
pub async fn cancel_story(
    State(state): State<AppState>,
    Path(story_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = find_job(&state, story_id).await?;

    let cancelled = match job.status()? {
        JobStatus::Pending => {
            let message = PipelineError::Cancelled.to_string();
            // A worker may claim the job between the read and the write.
            GenerationJobRepo::fail_pending(&state.pool, story_id, &message).await?
                || cancel_generating(&state, story_id).await?
        }
        JobStatus::Generating => cancel_generating(&state, story_id).await?,
        JobStatus::Completed | JobStatus::Error => false,
    };

    if !cancelled {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Story {story_id} is not being generated"
        ))));
    }

    tracing::info!(story_id, "Generation cancelled");

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: QueuedStory {
                story_id,
                status: JobStatus::Error,
            },
        }),
    ))
}

/// DELETE /api/v1/stories/{id}
///
/// Stop any running generation, delete the story and its job, then remove
/// its stored assets. Returns 204.
pub async fn delete_story(
    State(state): State<AppState>,
    Path(story_id): Path<DbId>,
) -> AppResult<StatusCode> {
    let story = StoryRepo::find_by_id(&state.pool, story_id)
        .await?
        .ok_or_else(|| story_not_found(story_id))?;
    let attempts = GenerationJobRepo::find_by_story(&state.pool, story_id)
        .await?
        .map_or(0, |job| job.attempt);

    state.registry.cancel(story_id);

    if !StoryRepo::delete(&state.pool, story_id).await? {
        return Err(story_not_found(story_id));
    }

    let mut keys: Vec<String> = story.images().into_iter().map(|a| a.key).collect();
    keys.extend((1..=attempts).map(|attempt| audio_key(story_id, attempt)));
    uploads::remove_all(state.storage.as_ref(), keys.iter().map(String::as_str)).await;

    tracing::info!(story_id, "Story deleted");
    Ok(StatusCode::NO_CONTENT)
}
