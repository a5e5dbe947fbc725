//! Capability traits for the external services the pipeline calls, and
//! their HTTP implementations.
//!
//! Each capability is an `async_trait` object so the orchestrator can be
//! built once at startup with whichever implementation the configuration
//! selects, and driven by scripted fakes in tests.

use std::sync::Arc;

use async_trait::async_trait;
use lullaby_core::prompts::Prompt;

use crate::config::{PipelineConfig, StorageConfig, TextProviderKind};
use crate::error::ProviderError;

pub mod elevenlabs;
pub mod gemini;
pub mod openai;
pub mod storage;

/// A language model that completes a system/user prompt pair.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError>;

    /// Provider name (e.g. "openai", "gemini").
    fn provider_name(&self) -> &'static str;

    fn model_name(&self) -> &str;
}

/// A multimodal model that describes a single image.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Describe `image` following `instructions`. Returns the raw reply.
    async fn describe_image(
        &self,
        image: &[u8],
        content_type: &str,
        instructions: &str,
    ) -> Result<String, ProviderError>;
}

/// Text-to-speech.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Narrate `text` with `voice`. Returns encoded audio (MP3).
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        language: &str,
    ) -> Result<Vec<u8>, ProviderError>;
}

/// Blob storage for uploads and generated audio.
#[async_trait]
pub trait AssetStorage: Send + Sync {
    /// Store `bytes` under `key`, replacing any existing object. Returns the
    /// object's public URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<String, ProviderError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, ProviderError>;

    /// Remove an object. Removing a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<(), ProviderError>;
}

/// The full set of providers a pipeline is built from.
#[derive(Clone)]
pub struct Providers {
    pub vision: Arc<dyn VisionModel>,
    pub text: Arc<dyn TextModel>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub storage: Arc<dyn AssetStorage>,
}

impl Providers {
    /// Build the HTTP-backed providers selected by `config`.
    ///
    /// All clients share one connection pool with the configured per-request
    /// timeout.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.provider_request_timeout)
            .build()?;

        let openai = Arc::new(openai::OpenAiClient::with_client(
            client.clone(),
            config.openai_base_url.clone(),
            config.openai_api_key.clone(),
            config.openai_text_model.clone(),
            config.openai_vision_model.clone(),
        ));

        let text: Arc<dyn TextModel> = match config.text_provider {
            TextProviderKind::OpenAi => openai.clone(),
            TextProviderKind::Gemini => Arc::new(gemini::GeminiClient::with_client(
                client.clone(),
                config.gemini_api_key.clone().unwrap_or_default(),
                config.gemini_model.clone(),
            )),
        };

        let speech = Arc::new(elevenlabs::ElevenLabsClient::with_client(
            client.clone(),
            config.elevenlabs_api_key.clone(),
            config.elevenlabs_model.clone(),
        ));

        let storage: Arc<dyn AssetStorage> = match &config.storage {
            StorageConfig::Local {
                root,
                public_base_url,
            } => Arc::new(storage::LocalStorage::new(
                root.clone(),
                public_base_url.clone(),
            )),
            StorageConfig::Supabase {
                url,
                service_key,
                bucket,
            } => Arc::new(storage::SupabaseStorage::with_client(
                client,
                url.clone(),
                service_key.clone(),
                bucket.clone(),
            )),
        };

        tracing::info!(
            text_provider = text.provider_name(),
            text_model = text.model_name(),
            "Providers configured",
        );

        Ok(Self {
            vision: openai,
            text,
            speech,
            storage,
        })
    }
}

/// Return the response unchanged on a 2xx status, otherwise a
/// [`ProviderError::Api`] carrying the status and body text.
pub(crate) async fn ensure_success(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(ProviderError::Api {
            provider,
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}
