//! Google Gemini `generateContent` client.

use async_trait::async_trait;
use lullaby_core::prompts::Prompt;
use serde::Deserialize;
use serde_json::json;

use super::{ensure_success, TextModel};
use crate::error::ProviderError;

const PROVIDER: &str = "gemini";
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// HTTP client for the Gemini text API.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate that has any.
    fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .filter_map(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .map(|text| text.trim().to_string())
            .find(|text| !text.is_empty())
    }
}

impl GeminiClient {
    pub fn with_client(client: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl TextModel for GeminiClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let body = json!({
            "systemInstruction": { "parts": [{ "text": prompt.system }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt.user }] }],
            "generationConfig": {
                "maxOutputTokens": prompt.max_tokens,
                "temperature": 0.8,
            },
        });

        let response = self
            .client
            .post(format!("{BASE_URL}/models/{}:generateContent", self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let parsed: GenerateResponse = ensure_success(PROVIDER, response).await?.json().await?;
        parsed
            .into_text()
            .ok_or(ProviderError::EmptyResponse { provider: PROVIDER })
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
