//! Story content rows: the artifacts a generation produces.

use lullaby_core::analysis::ImageAsset;
use lullaby_core::story::StoryParameters;
use lullaby_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `stories` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Story {
    pub id: DbId,
    pub title: Option<String>,
    pub text_content: Option<String>,
    pub audio_url: Option<String>,
    pub word_count: Option<i32>,
    pub uploaded_images: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Story {
    /// Decode `uploaded_images`. Malformed entries are dropped.
    pub fn images(&self) -> Vec<ImageAsset> {
        match &self.uploaded_images {
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// DTO for creating a story together with its pending generation job.
#[derive(Debug, Clone)]
pub struct CreateStory {
    pub parameters: StoryParameters,
    pub uploaded_images: Vec<ImageAsset>,
}
