//! Narration: speech synthesis and upload of the resulting audio.
//!
//! Failures here are not absorbed; the orchestrator treats them as fatal.

use std::sync::Arc;

use lullaby_core::types::DbId;

use crate::error::ProviderError;
use crate::providers::{AssetStorage, SpeechSynthesizer};

const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

pub struct AudioSynthesizer {
    speech: Arc<dyn SpeechSynthesizer>,
    storage: Arc<dyn AssetStorage>,
}

impl AudioSynthesizer {
    pub fn new(speech: Arc<dyn SpeechSynthesizer>, storage: Arc<dyn AssetStorage>) -> Self {
        Self { speech, storage }
    }

    /// Narrate the story text. Returns MP3 bytes.
    pub async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        language: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        self.speech.synthesize(text, voice, language).await
    }

    /// Upload narration for one attempt and return its public URL.
    ///
    /// Keys are per attempt so a retry never overwrites audio that a client
    /// may still be playing.
    pub async fn store(
        &self,
        story_id: DbId,
        attempt: i32,
        audio: Vec<u8>,
    ) -> Result<String, ProviderError> {
        self.storage
            .put(&audio_key(story_id, attempt), audio, AUDIO_CONTENT_TYPE)
            .await
    }
}

/// Storage key of a story's narration for `attempt`.
pub fn audio_key(story_id: DbId, attempt: i32) -> String {
    format!("stories/{story_id}/narration-{attempt}.mp3")
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::testing::{FakeSpeech, MemoryStorage};

    #[tokio::test]
    async fn stores_audio_under_attempt_key() {
        let storage = Arc::new(MemoryStorage::default());
        let audio = AudioSynthesizer::new(Arc::new(FakeSpeech::default()), storage.clone());

        let bytes = audio.synthesize("Once upon a time", "v1", "en").await.unwrap();
        let url = audio.store(7, 2, bytes).await.unwrap();

        assert_eq!(url, "memory://stories/7/narration-2.mp3");
        assert!(storage.contains("stories/7/narration-2.mp3"));
    }

    #[tokio::test]
    async fn synthesis_failure_propagates() {
        let audio = AudioSynthesizer::new(
            Arc::new(FakeSpeech::failing()),
            Arc::new(MemoryStorage::default()),
        );
        assert_matches!(
            audio.synthesize("text", "v1", "en").await,
            Err(ProviderError::Api { .. })
        );
    }
}
