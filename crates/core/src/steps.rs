//! Generation step vocabulary and its public projection.
//!
//! [`GenerationStep`] is the single source of truth for the internal state
//! machine. [`GenerationStep::public`] maps it to the smaller vocabulary the
//! status endpoint exposes. `Finalizing` and `Saving` surface as
//! `"image-generation"`; that name is kept as-is because existing clients
//! key their progress UI on it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Progress milestones
// ---------------------------------------------------------------------------

/// Progress written when a job is created or reset for retry.
pub const PROGRESS_PENDING: i16 = 0;
/// Entering image analysis.
pub const PROGRESS_ANALYZING_IMAGES: i16 = 10;
/// Entering title generation.
pub const PROGRESS_GENERATING_TITLE: i16 = 25;
/// Entering story text generation.
pub const PROGRESS_STORY_GENERATION: i16 = 35;
/// First draft returned; length validation / extension pending.
pub const PROGRESS_STORY_DRAFTED: i16 = 50;
/// Story text final; entering audio synthesis.
pub const PROGRESS_AUDIO_GENERATION: i16 = 60;
/// Audio synthesized; uploading the asset.
pub const PROGRESS_AUDIO_SYNTHESIZED: i16 = 75;
/// Entering finalization.
pub const PROGRESS_FINALIZING: i16 = 85;
/// Entering the final content write.
pub const PROGRESS_SAVING: i16 = 95;
/// Terminal success.
pub const PROGRESS_COMPLETED: i16 = 100;

// ---------------------------------------------------------------------------
// Internal steps
// ---------------------------------------------------------------------------

/// Internal step of the generation state machine, persisted as
/// `generation_jobs.current_step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationStep {
    AnalyzingImages,
    GeneratingTitle,
    StoryGeneration,
    AudioGeneration,
    Finalizing,
    Saving,
    Completed,
    Error,
}

impl GenerationStep {
    /// Every internal step in pipeline order.
    pub const ALL: [GenerationStep; 8] = [
        Self::AnalyzingImages,
        Self::GeneratingTitle,
        Self::StoryGeneration,
        Self::AudioGeneration,
        Self::Finalizing,
        Self::Saving,
        Self::Completed,
        Self::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AnalyzingImages => "analyzing-images",
            Self::GeneratingTitle => "generating-title",
            Self::StoryGeneration => "story-generation",
            Self::AudioGeneration => "audio-generation",
            Self::Finalizing => "finalizing",
            Self::Saving => "saving",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Project onto the client-facing vocabulary.
    pub fn public(self) -> PublicStep {
        match self {
            Self::AnalyzingImages | Self::GeneratingTitle | Self::StoryGeneration => {
                PublicStep::StoryGeneration
            }
            Self::AudioGeneration => PublicStep::AudioGeneration,
            Self::Finalizing | Self::Saving => PublicStep::ImageGeneration,
            Self::Completed => PublicStep::Completed,
            Self::Error => PublicStep::Error,
        }
    }

    /// Whether this step only appears on a terminal job.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl fmt::Display for GenerationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationStep {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown generation step '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Public steps
// ---------------------------------------------------------------------------

/// Step name as reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublicStep {
    StoryGeneration,
    AudioGeneration,
    ImageGeneration,
    Completed,
    Error,
}

impl PublicStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StoryGeneration => "story-generation",
            Self::AudioGeneration => "audio-generation",
            Self::ImageGeneration => "image-generation",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for PublicStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_mapping_table() {
        let table = [
            (GenerationStep::AnalyzingImages, "story-generation"),
            (GenerationStep::GeneratingTitle, "story-generation"),
            (GenerationStep::StoryGeneration, "story-generation"),
            (GenerationStep::AudioGeneration, "audio-generation"),
            (GenerationStep::Finalizing, "image-generation"),
            (GenerationStep::Saving, "image-generation"),
            (GenerationStep::Completed, "completed"),
            (GenerationStep::Error, "error"),
        ];
        assert_eq!(table.len(), GenerationStep::ALL.len());
        for (step, expected) in table {
            assert_eq!(step.public().as_str(), expected, "mapping for {step}");
        }
    }

    #[test]
    fn parse_round_trips_every_step() {
        for step in GenerationStep::ALL {
            assert_eq!(step.as_str().parse::<GenerationStep>().unwrap(), step);
        }
    }

    #[test]
    fn parse_rejects_unknown() {
        assert!("image-generation".parse::<GenerationStep>().is_err());
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&GenerationStep::AnalyzingImages).unwrap();
        assert_eq!(json, "\"analyzing-images\"");
        let json = serde_json::to_string(&PublicStep::ImageGeneration).unwrap();
        assert_eq!(json, "\"image-generation\"");
    }

    #[test]
    fn milestones_strictly_increase() {
        let milestones = [
            PROGRESS_PENDING,
            PROGRESS_ANALYZING_IMAGES,
            PROGRESS_GENERATING_TITLE,
            PROGRESS_STORY_GENERATION,
            PROGRESS_STORY_DRAFTED,
            PROGRESS_AUDIO_GENERATION,
            PROGRESS_AUDIO_SYNTHESIZED,
            PROGRESS_FINALIZING,
            PROGRESS_SAVING,
            PROGRESS_COMPLETED,
        ];
        assert!(milestones.windows(2).all(|w| w[0] < w[1]));
    }
}
