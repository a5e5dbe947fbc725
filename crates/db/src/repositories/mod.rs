//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod generation_job_repo;
pub mod story_repo;

pub use generation_job_repo::GenerationJobRepo;
pub use story_repo::StoryRepo;
