//! Generation job rows: lifecycle state of one story's generation.

use lullaby_core::error::CoreError;
use lullaby_core::steps::GenerationStep;
use lullaby_core::story::StoryParameters;
use lullaby_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::{JobStatus, StatusId};

/// A row from the `generation_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GenerationJob {
    pub story_id: DbId,
    pub status_id: StatusId,
    pub progress: i16,
    pub current_step: String,
    pub error_message: Option<String>,
    pub parameters: serde_json::Value,
    /// Number of times this job has been claimed by a worker.
    pub attempt: i32,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl GenerationJob {
    pub fn status(&self) -> Result<JobStatus, CoreError> {
        JobStatus::from_id(self.status_id)
            .ok_or_else(|| CoreError::Internal(format!("Unknown job status id {}", self.status_id)))
    }

    pub fn step(&self) -> Result<GenerationStep, CoreError> {
        self.current_step.parse()
    }

    /// Decode the stored story parameters.
    pub fn story_parameters(&self) -> Result<StoryParameters, CoreError> {
        serde_json::from_value(self.parameters.clone()).map_err(|e| {
            CoreError::Internal(format!(
                "Stored parameters for story {} are invalid: {e}",
                self.story_id
            ))
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_ok_and(JobStatus::is_terminal)
    }
}
