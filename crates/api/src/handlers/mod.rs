//! Request handlers.
//!
//! Handlers delegate to the repositories in `lullaby_db` and map errors via
//! [`AppError`](crate::error::AppError).

pub mod stories;
