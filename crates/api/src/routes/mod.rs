pub mod health;
pub mod stories;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /stories                      create (POST, multipart)
/// /stories/{id}                 get, delete
/// /stories/{id}/status          poll generation status
/// /stories/{id}/retry           re-queue a finished story (POST)
/// /stories/{id}/cancel          stop a queued or running story (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/stories", stories::router())
}
