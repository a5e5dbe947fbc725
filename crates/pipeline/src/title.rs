//! Title generation. Never fails: any model problem yields the
//! deterministic fallback title.

use std::sync::Arc;

use lullaby_core::analysis::ImageAnalysis;
use lullaby_core::prompts::{clean_title, title_prompt};
use lullaby_core::story::StoryParameters;
use lullaby_core::templates::fallback_title;

use crate::providers::TextModel;

pub struct TitleGenerator {
    model: Arc<dyn TextModel>,
}

impl TitleGenerator {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    pub async fn generate(&self, params: &StoryParameters, analyses: &[ImageAnalysis]) -> String {
        let fallback =
            || fallback_title(&params.theme, params.lead_character(), &params.language);

        match self.model.complete(&title_prompt(params, analyses)).await {
            Ok(reply) => clean_title(&reply).unwrap_or_else(|| {
                tracing::warn!("Model returned an unusable title, using fallback");
                fallback()
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Title generation failed, using fallback");
                fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, ScriptedTextModel};
    use lullaby_core::story::{Character, DurationTier};

    fn params() -> StoryParameters {
        StoryParameters {
            theme: "ocean".into(),
            characters: vec![Character::new("Alex", "brave")],
            language: "en".into(),
            voice: "voice-1".into(),
            duration_tier: DurationTier::Short,
            target_age: "5-7".into(),
            custom_prompt: None,
        }
    }

    async fn title_with(reply: Reply) -> String {
        TitleGenerator::new(Arc::new(ScriptedTextModel::new([reply])))
            .generate(&params(), &[])
            .await
    }

    #[tokio::test]
    async fn uses_cleaned_model_title() {
        assert_eq!(
            title_with(Reply::text("Title: \"Alex and the Moon\"")).await,
            "Alex and the Moon"
        );
    }

    #[tokio::test]
    async fn failure_falls_back_deterministically() {
        let first = title_with(Reply::Fail).await;
        let second = title_with(Reply::Fail).await;
        assert_eq!(first, "Alex's Ocean Adventure");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn empty_reply_falls_back() {
        assert_eq!(
            title_with(Reply::text("  ")).await,
            "Alex's Ocean Adventure"
        );
    }
}
