#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use lullaby_core::retry::RetryPolicy;
use lullaby_pipeline::testing::MemoryStorage;
use lullaby_worker::cancellation::CancellationRegistry;
use lullaby_worker::dispatcher::JobNotifier;
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;

use lullaby_api::config::ServerConfig;
use lullaby_api::router::build_app_router;
use lullaby_api::state::AppState;

pub const BOUNDARY: &str = "lullaby-test-boundary";

/// Smallest header `image::guess_format` recognizes as PNG.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRfake-image-body";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        max_upload_bytes: 1024 * 1024,
        max_upload_images: 5,
        embedded_worker: false,
    }
}

/// Everything a test may want to inspect besides the router.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub storage: Arc<MemoryStorage>,
}

/// Build the full application router with all middleware layers, backed by
/// in-memory asset storage and a status retry policy that never sleeps.
pub fn build_test_app(pool: PgPool) -> TestApp {
    build_test_app_with_storage(pool, Arc::new(MemoryStorage::default()))
}

pub fn build_test_app_with_storage(pool: PgPool, storage: Arc<MemoryStorage>) -> TestApp {
    build_test_app_with(pool, storage, RetryPolicy::immediate(3))
}

/// Like [`build_test_app`], with a custom policy for status re-reads.
pub fn build_test_app_with_status_retry(pool: PgPool, status_retry: RetryPolicy) -> TestApp {
    build_test_app_with(pool, Arc::new(MemoryStorage::default()), status_retry)
}

fn build_test_app_with(
    pool: PgPool,
    storage: Arc<MemoryStorage>,
    status_retry: RetryPolicy,
) -> TestApp {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        storage: storage.clone(),
        notifier: JobNotifier::new(),
        registry: Arc::new(CancellationRegistry::new()),
        status_retry,
    };
    let router = build_app_router(state.clone(), &config, None);
    TestApp {
        router,
        state,
        storage,
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn post_empty(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &Router, uri: &str, body: &Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn delete(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// POST a multipart create request with an optional `params` field and
/// the given image files.
pub async fn post_story(
    app: &Router,
    params: Option<&Value>,
    images: &[(&str, &[u8])],
) -> Response<Body> {
    let mut body: Vec<u8> = Vec::new();
    if let Some(params) = params {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"params\"\r\n\r\n{params}\r\n"
            )
            .as_bytes(),
        );
    }
    for (file_name, bytes) in images {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/stories")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Valid story parameters in the wire format.
pub fn story_params() -> Value {
    serde_json::json!({
        "theme": "adventure",
        "characters": [{ "name": "Alex", "description": "brave" }],
        "language": "en",
        "voice": "voice-1",
        "durationTier": "short",
        "targetAge": "5-7"
    })
}
