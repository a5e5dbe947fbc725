//! Story generation pipeline: provider integrations, the stage components,
//! and the orchestrator that drives a job to completion.

pub mod audio;
pub mod config;
pub mod error;
pub mod image_analyzer;
pub mod orchestrator;
pub mod providers;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod text;
pub mod title;

pub use config::PipelineConfig;
pub use orchestrator::{ClaimedJob, Outcome, Pipeline};
pub use providers::Providers;
