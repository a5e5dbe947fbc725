//! Story text generation with one length extension and a template
//! fallback.

use std::sync::Arc;

use lullaby_core::analysis::ImageAnalysis;
use lullaby_core::prompts::{extension_prompt, story_prompt};
use lullaby_core::story::{word_count, StoryParameters};
use lullaby_core::templates::fallback_story;

use crate::providers::TextModel;

/// How the returned text was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    /// The first model reply met the minimum length.
    Model,
    /// The first reply was short and the extension call succeeded.
    Extended,
    /// The first reply was short and the extension call failed; the short
    /// draft is kept.
    Short,
    /// The model call failed; the deterministic template was used.
    Fallback,
}

impl TextSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Extended => "extended",
            Self::Short => "short",
            Self::Fallback => "fallback",
        }
    }
}

/// Generated story text. `text` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedText {
    pub text: String,
    pub word_count: usize,
    pub source: TextSource,
}

impl GeneratedText {
    fn new(text: String, source: TextSource) -> Self {
        Self {
            word_count: word_count(&text),
            text,
            source,
        }
    }
}

pub struct TextGenerator {
    model: Arc<dyn TextModel>,
}

impl TextGenerator {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    /// Produce story text of at least the tier's minimum word count when
    /// the model cooperates. Never fails.
    pub async fn generate(
        &self,
        params: &StoryParameters,
        analyses: &[ImageAnalysis],
    ) -> GeneratedText {
        let draft = match self.model.complete(&story_prompt(params, analyses)).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => {
                tracing::warn!("Model returned an empty story, using template");
                return GeneratedText::new(fallback_story(params), TextSource::Fallback);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Story generation failed, using template");
                return GeneratedText::new(fallback_story(params), TextSource::Fallback);
            }
        };

        let min_words = params.duration_tier.min_words();
        let words = word_count(&draft);
        if words >= min_words {
            return GeneratedText::new(draft, TextSource::Model);
        }

        let missing = min_words - words;
        tracing::info!(words, min_words, missing, "Story is short, requesting extension");

        match self
            .model
            .complete(&extension_prompt(params, &draft, missing))
            .await
        {
            Ok(extra) if !extra.trim().is_empty() => GeneratedText::new(
                format!("{draft}\n\n{}", extra.trim()),
                TextSource::Extended,
            ),
            Ok(_) => {
                tracing::warn!("Extension was empty, keeping short story");
                GeneratedText::new(draft, TextSource::Short)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Extension failed, keeping short story");
                GeneratedText::new(draft, TextSource::Short)
            }
        }
    }
}
