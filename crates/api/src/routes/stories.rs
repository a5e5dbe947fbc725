//! Route definitions for the `/stories` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::stories;
use crate::state::AppState;

/// Routes mounted at `/stories`.
///
/// ```text
/// POST   /                -> create_story
/// GET    /{id}            -> get_story
/// DELETE /{id}            -> delete_story
/// GET    /{id}/status     -> get_status
/// POST   /{id}/retry      -> retry_story
/// POST   /{id}/cancel     -> cancel_story
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(stories::create_story))
        .route("/{id}", get(stories::get_story).delete(stories::delete_story))
        .route("/{id}/status", get(stories::get_status))
        .route("/{id}/retry", post(stories::retry_story))
        .route("/{id}/cancel", post(stories::cancel_story))
}
