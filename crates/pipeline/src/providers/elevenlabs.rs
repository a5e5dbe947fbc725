//! ElevenLabs text-to-speech client.

use async_trait::async_trait;
use serde_json::json;

use super::{ensure_success, SpeechSynthesizer};
use crate::error::ProviderError;

const PROVIDER: &str = "elevenlabs";
const BASE_URL: &str = "https://api.elevenlabs.io/v1";

/// Models that accept an explicit `language_code`. Others detect the
/// language from the text.
const LANGUAGE_AWARE_MODELS: [&str; 2] = ["eleven_turbo_v2_5", "eleven_flash_v2_5"];

/// HTTP client for the ElevenLabs `text-to-speech` endpoint.
pub struct ElevenLabsClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl ElevenLabsClient {
    pub fn with_client(client: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }

    /// Endpoint for one voice. The id is pushed as a single encoded path
    /// segment so it can never address another API route.
    fn speech_url(voice: &str) -> Result<reqwest::Url, ProviderError> {
        let mut url =
            reqwest::Url::parse(BASE_URL).map_err(|e| ProviderError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| ProviderError::InvalidUrl(BASE_URL.to_string()))?
            .push("text-to-speech")
            .push(voice);
        Ok(url)
    }

    fn request_body(&self, text: &str, language: &str) -> serde_json::Value {
        let mut body = json!({
            "text": text,
            "model_id": self.model,
            "voice_settings": { "stability": 0.6, "similarity_boost": 0.75 },
        });
        if LANGUAGE_AWARE_MODELS.contains(&self.model.as_str()) {
            body["language_code"] = json!(lullaby_core::language::normalize_language(language));
        }
        body
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        language: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        let response = self
            .client
            .post(Self::speech_url(voice)?)
            .query(&[("output_format", "mp3_44100_128")])
            .header("xi-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&self.request_body(text, language))
            .send()
            .await?;

        let bytes = ensure_success(PROVIDER, response).await?.bytes().await?;
        if bytes.is_empty() {
            return Err(ProviderError::EmptyResponse { provider: PROVIDER });
        }
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_code_only_for_language_aware_models() {
        let multilingual = ElevenLabsClient::with_client(
            reqwest::Client::new(),
            "key".into(),
            "eleven_multilingual_v2".into(),
        );
        assert!(multilingual.request_body("hi", "es").get("language_code").is_none());

        let turbo = ElevenLabsClient::with_client(
            reqwest::Client::new(),
            "key".into(),
            "eleven_turbo_v2_5".into(),
        );
        assert_eq!(turbo.request_body("hi", "es-MX")["language_code"], "es");
    }

    #[test]
    fn speech_url_appends_voice_segment() {
        let url = ElevenLabsClient::speech_url("21m00Tcm4TlvDq8ikWAM").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.elevenlabs.io/v1/text-to-speech/21m00Tcm4TlvDq8ikWAM"
        );
    }

    #[test]
    fn speech_url_keeps_hostile_voice_in_one_segment() {
        let url = ElevenLabsClient::speech_url("../../v1/user?x=").unwrap();
        assert_eq!(url.host_str(), Some("api.elevenlabs.io"));
        assert!(url.query().is_none());
        assert!(url.path().starts_with("/v1/text-to-speech/"));
        assert_eq!(url.path_segments().unwrap().count(), 3);
    }
}
