//! Integration tests for the `/api/v1/stories` endpoints.
//!
//! Jobs are driven through their states with the repositories directly;
//! one test runs a queued story through a real dispatcher with fake
//! providers.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use common::{body_json, delete, get, post_empty, post_json, post_story, story_params, PNG_BYTES};
use lullaby_core::retry::RetryPolicy;
use lullaby_core::steps::GenerationStep;
use lullaby_db::models::status::JobStatus;
use lullaby_db::repositories::GenerationJobRepo;
use lullaby_pipeline::config::StageTimeouts;
use lullaby_pipeline::store::PgGenerationStore;
use lullaby_pipeline::testing::{FakeSpeech, FakeVision, MemoryStorage, Reply, ScriptedTextModel};
use lullaby_pipeline::{Pipeline, Providers};
use lullaby_worker::config::WorkerConfig;
use lullaby_worker::dispatcher::JobDispatcher;
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a story through the API and return its id.
async fn create(app: &common::TestApp) -> i64 {
    let response = post_story(&app.router, Some(&story_params()), &[]).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    body_json(response).await["data"]["story_id"].as_i64().unwrap()
}

/// Create a story and claim its job, returning `(story_id, attempt)`.
async fn create_running(app: &common::TestApp, pool: &PgPool) -> (i64, i32) {
    let story_id = create(app).await;
    let job = GenerationJobRepo::claim_next(pool).await.unwrap().unwrap();
    assert_eq!(job.story_id, story_id);
    (story_id, job.attempt)
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn create_queues_pending_job_with_images(pool: PgPool) {
    let app = common::build_test_app(pool.clone());

    let response = post_story(
        &app.router,
        Some(&story_params()),
        &[("beach.png", PNG_BYTES), ("park.png", PNG_BYTES)],
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "pending");
    let story_id = json["data"]["story_id"].as_i64().unwrap();

    let job = GenerationJobRepo::find_by_story(&pool, story_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::Pending);
    assert_eq!(job.story_parameters().unwrap().theme, "adventure");

    let story = body_json(get(&app.router, &format!("/api/v1/stories/{story_id}")).await).await;
    let images = story["data"]["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    for image in images {
        assert_eq!(image["content_type"], "image/png");
        assert!(app.storage.contains(image["key"].as_str().unwrap()));
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn create_without_params_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = post_story(&app.router, None, &[("a.png", PNG_BYTES)]).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn create_with_invalid_params_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let mut params = story_params();
    params["theme"] = json!("   ");

    let response = post_story(&app.router, Some(&params), &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stories")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn create_with_unknown_duration_tier_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool);
    let mut params = story_params();
    params["durationTier"] = json!("epic");

    let response = post_story(&app.router, Some(&params), &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn create_rejects_non_image_upload(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = post_story(
        &app.router,
        Some(&story_params()),
        &[("notes.txt", &b"just some text"[..])],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("notes.txt"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn create_rejects_too_many_images(pool: PgPool) {
    let app = common::build_test_app(pool);
    let images: Vec<(&str, &[u8])> = (0..6).map(|_| ("a.png", PNG_BYTES)).collect();

    let response = post_story(&app.router, Some(&story_params()), &images).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn status_of_new_story_is_pending(pool: PgPool) {
    let app = common::build_test_app(pool);
    let story_id = create(&app).await;

    let response = get(&app.router, &format!("/api/v1/stories/{story_id}/status")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "no-store, no-cache, must-revalidate, max-age=0"
    );
    assert_eq!(response.headers().get("pragma").unwrap(), "no-cache");
    assert_eq!(response.headers().get("expires").unwrap(), "0");

    let json = body_json(response).await;
    assert_eq!(json["status"], "pending");
    assert_eq!(json["progress"], 0);
    assert_eq!(json["currentStep"], "story-generation");
    assert_eq!(json["completed"], false);
    assert!(json["error"].is_null());
    assert!(json["timestamp"].is_string());
    assert!(json.get("data").is_none());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn status_maps_internal_steps_to_public_names(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let (story_id, attempt) = create_running(&app, &pool).await;
    let uri = format!("/api/v1/stories/{story_id}/status");

    for (step, progress, public) in [
        (GenerationStep::GeneratingTitle, 25, "story-generation"),
        (GenerationStep::AudioGeneration, 60, "audio-generation"),
        (GenerationStep::Finalizing, 85, "image-generation"),
        (GenerationStep::Saving, 95, "image-generation"),
    ] {
        assert!(
            GenerationJobRepo::update_progress(&pool, story_id, attempt, step, progress)
                .await
                .unwrap()
        );
        let json = body_json(get(&app.router, &uri).await).await;
        assert_eq!(json["status"], "generating");
        assert_eq!(json["progress"], progress);
        assert_eq!(json["currentStep"], public, "public name of {step}");
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn status_returns_latest_read_when_still_behind_expected(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let (story_id, attempt) = create_running(&app, &pool).await;
    GenerationJobRepo::update_progress(&pool, story_id, attempt, GenerationStep::GeneratingTitle, 25)
        .await
        .unwrap();

    let response = get(
        &app.router,
        &format!("/api/v1/stories/{story_id}/status?expectedProgress=60"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["progress"], 25);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn status_rereads_until_expected_progress_arrives(pool: PgPool) {
    let delay = Duration::from_millis(200);
    let app = common::build_test_app_with_status_retry(
        pool.clone(),
        RetryPolicy {
            max_attempts: 5,
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
        },
    );
    let (story_id, attempt) = create_running(&app, &pool).await;
    GenerationJobRepo::update_progress(&pool, story_id, attempt, GenerationStep::GeneratingTitle, 25)
        .await
        .unwrap();

    // The write lands after the first read but before the second.
    let writer_pool = pool.clone();
    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        GenerationJobRepo::update_progress(
            &writer_pool,
            story_id,
            attempt,
            GenerationStep::AudioGeneration,
            60,
        )
        .await
        .unwrap()
    });

    let started = Instant::now();
    let response = get(
        &app.router,
        &format!("/api/v1/stories/{story_id}/status?expectedProgress=60"),
    )
    .await;
    let elapsed = started.elapsed();
    assert!(writer.await.unwrap());

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["progress"], 60);
    assert_eq!(json["currentStep"], "audio-generation");
    // Only a behind-expected read sleeps, so a second read happened.
    assert!(elapsed >= delay, "answered after {elapsed:?} without re-reading");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn status_reports_error_message(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let (story_id, attempt) = create_running(&app, &pool).await;
    GenerationJobRepo::fail(&pool, story_id, attempt, "Audio generation failed: boom")
        .await
        .unwrap();

    let json = body_json(get(&app.router, &format!("/api/v1/stories/{story_id}/status")).await).await;
    assert_eq!(json["status"], "error");
    assert_eq!(json["currentStep"], "error");
    assert_eq!(json["error"], "Audio generation failed: boom");
    assert_eq!(json["completed"], false);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn status_of_unknown_story_is_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(&app.router, "/api/v1/stories/999999/status").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn retry_of_running_story_is_conflict(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let (story_id, _) = create_running(&app, &pool).await;

    let response = post_empty(&app.router, &format!("/api/v1/stories/{story_id}/retry")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn retry_resets_failed_story(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let (story_id, attempt) = create_running(&app, &pool).await;
    GenerationJobRepo::update_progress(&pool, story_id, attempt, GenerationStep::AudioGeneration, 60)
        .await
        .unwrap();
    GenerationJobRepo::fail(&pool, story_id, attempt, "Audio generation failed: boom")
        .await
        .unwrap();

    let response = post_empty(&app.router, &format!("/api/v1/stories/{story_id}/retry")).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = body_json(get(&app.router, &format!("/api/v1/stories/{story_id}/status")).await).await;
    assert_eq!(json["status"], "pending");
    assert_eq!(json["progress"], 0);
    assert_eq!(json["currentStep"], "story-generation");
    assert!(json["error"].is_null());

    // Original parameters are kept without a body.
    let job = GenerationJobRepo::find_by_story(&pool, story_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.story_parameters().unwrap().theme, "adventure");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn retry_with_body_replaces_parameters(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let (story_id, attempt) = create_running(&app, &pool).await;
    GenerationJobRepo::fail(&pool, story_id, attempt, "boom").await.unwrap();

    let mut params = story_params();
    params["theme"] = json!("space");
    let response = post_json(&app.router, &format!("/api/v1/stories/{story_id}/retry"), &params).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let job = GenerationJobRepo::find_by_story(&pool, story_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.story_parameters().unwrap().theme, "space");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn retry_with_invalid_body_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let (story_id, attempt) = create_running(&app, &pool).await;
    GenerationJobRepo::fail(&pool, story_id, attempt, "boom").await.unwrap();

    let response = post_json(
        &app.router,
        &format!("/api/v1/stories/{story_id}/retry"),
        &json!({ "theme": "space" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let job = GenerationJobRepo::find_by_story(&pool, story_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::Error);
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn cancel_pending_story_fails_it(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let story_id = create(&app).await;

    let response = post_empty(&app.router, &format!("/api/v1/stories/{story_id}/cancel")).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = body_json(get(&app.router, &format!("/api/v1/stories/{story_id}/status")).await).await;
    assert_eq!(json["status"], "error");
    assert_eq!(json["error"], "Generation was cancelled");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn cancel_running_story_signals_its_task(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let (story_id, attempt) = create_running(&app, &pool).await;
    let token = app.state.registry.register(story_id, attempt);

    let response = post_empty(&app.router, &format!("/api/v1/stories/{story_id}/cancel")).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(token.is_cancelled());

    let job = GenerationJobRepo::find_by_story(&pool, story_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::Error);
    assert_eq!(job.error_message.as_deref(), Some("Generation was cancelled"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn cancel_finished_story_is_conflict(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let (story_id, attempt) = create_running(&app, &pool).await;
    GenerationJobRepo::fail(&pool, story_id, attempt, "boom").await.unwrap();

    let response = post_empty(&app.router, &format!("/api/v1/stories/{story_id}/cancel")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn delete_removes_story_job_and_uploads(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let response = post_story(&app.router, Some(&story_params()), &[("a.png", PNG_BYTES)]).await;
    let story_id = body_json(response).await["data"]["story_id"].as_i64().unwrap();

    let story = body_json(get(&app.router, &format!("/api/v1/stories/{story_id}")).await).await;
    let key = story["data"]["images"][0]["key"].as_str().unwrap().to_string();
    assert!(app.storage.contains(&key));

    let response = delete(&app.router, &format!("/api/v1/stories/{story_id}")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert!(!app.storage.contains(&key));
    assert!(GenerationJobRepo::find_by_story(&pool, story_id)
        .await
        .unwrap()
        .is_none());
    let response = get(&app.router, &format!("/api/v1/stories/{story_id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn delete_of_unknown_story_is_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = delete(&app.router, "/api/v1/stories/424242").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn queued_story_is_generated_by_the_dispatcher(pool: PgPool) {
    let storage = Arc::new(MemoryStorage::default());
    let app = common::build_test_app_with_storage(pool.clone(), storage.clone());

    let response = post_story(
        &app.router,
        Some(&story_params()),
        &[("a.png", PNG_BYTES), ("b.png", &b"corrupt-bytes"[..]), ("c.png", PNG_BYTES)],
    )
    .await;
    // The corrupt upload is not a PNG and is refused at the door.
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_story(
        &app.router,
        Some(&story_params()),
        &[("a.png", PNG_BYTES), ("c.png", PNG_BYTES)],
    )
    .await;
    let story_id = body_json(response).await["data"]["story_id"].as_i64().unwrap();

    let providers = Providers {
        vision: Arc::new(FakeVision::default()),
        text: Arc::new(ScriptedTextModel::new([
            Reply::text("Alex and the Tide"),
            Reply::words(310),
        ])),
        speech: Arc::new(FakeSpeech::default()),
        storage,
    };
    let pipeline = Arc::new(Pipeline::new(
        &providers,
        Arc::new(PgGenerationStore::new(pool.clone())),
        StageTimeouts::default(),
    ));
    let dispatcher = JobDispatcher::new(
        pool.clone(),
        pipeline,
        app.state.registry.clone(),
        app.state.notifier.clone(),
        &WorkerConfig::default(),
    );
    assert_eq!(dispatcher.dispatch_pending().await.unwrap(), 1);

    let uri = format!("/api/v1/stories/{story_id}/status");
    let mut last = serde_json::Value::Null;
    for _ in 0..200 {
        last = body_json(get(&app.router, &uri).await).await;
        if last["completed"] == true || last["status"] == "error" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert_eq!(last["status"], "completed");
    assert_eq!(last["progress"], 100);
    assert_eq!(last["currentStep"], "completed");

    let story = body_json(get(&app.router, &format!("/api/v1/stories/{story_id}")).await).await;
    assert_eq!(story["data"]["title"], "Alex and the Tide");
    assert_eq!(story["data"]["word_count"], 310);
    assert!(story["data"]["audio_url"].as_str().unwrap().starts_with("memory://"));
}
