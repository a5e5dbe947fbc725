//! Pure domain logic for bedtime-story generation.
//!
//! Story parameters and their validation, the generation step vocabulary,
//! prompt construction, deterministic fallbacks, and the retry policy. No
//! database or network access lives here.

pub mod analysis;
pub mod error;
pub mod language;
pub mod prompts;
pub mod retry;
pub mod steps;
pub mod story;
pub mod templates;
pub mod types;
