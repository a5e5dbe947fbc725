//! OpenAI chat-completions client, used for both text and vision.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lullaby_core::prompts::Prompt;
use serde::Deserialize;
use serde_json::json;

use super::{ensure_success, TextModel, VisionModel};
use crate::error::ProviderError;

const PROVIDER: &str = "openai";

/// Output budget for a single image description.
const VISION_MAX_TOKENS: u32 = 500;

/// HTTP client for the OpenAI chat-completions endpoint.
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    text_model: String,
    vision_model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a client reusing an existing [`reqwest::Client`].
    ///
    /// * `base_url` - API root, e.g. `https://api.openai.com/v1`.
    pub fn with_client(
        client: reqwest::Client,
        base_url: String,
        api_key: String,
        text_model: String,
        vision_model: String,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            text_model,
            vision_model,
        }
    }

    async fn chat(&self, body: serde_json::Value) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let parsed: ChatResponse = ensure_success(PROVIDER, response).await?.json().await?;
        parsed
            .choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .find(|c| !c.is_empty())
            .ok_or(ProviderError::EmptyResponse { provider: PROVIDER })
    }
}

#[async_trait]
impl TextModel for OpenAiClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        self.chat(json!({
            "model": self.text_model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
            "max_tokens": prompt.max_tokens,
            "temperature": 0.8,
        }))
        .await
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn model_name(&self) -> &str {
        &self.text_model
    }
}

#[async_trait]
impl VisionModel for OpenAiClient {
    async fn describe_image(
        &self,
        image: &[u8],
        content_type: &str,
        instructions: &str,
    ) -> Result<String, ProviderError> {
        self.chat(json!({
            "model": self.vision_model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": instructions },
                    { "type": "image_url", "image_url": { "url": data_uri(image, content_type) } },
                ],
            }],
            "max_tokens": VISION_MAX_TOKENS,
        }))
        .await
    }
}

/// Inline an image as a base64 `data:` URI.
fn data_uri(image: &[u8], content_type: &str) -> String {
    format!("data:{content_type};base64,{}", STANDARD.encode(image))
}
