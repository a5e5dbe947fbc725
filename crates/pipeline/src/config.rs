//! Pipeline configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Which text-generation provider backs the title and story stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextProviderKind {
    OpenAi,
    Gemini,
}

impl std::str::FromStr for TextProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            other => Err(format!("unknown text provider '{other}'")),
        }
    }
}

/// Where uploaded images and synthesized audio are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Local {
        root: PathBuf,
        public_base_url: String,
    },
    Supabase {
        url: String,
        service_key: String,
        bucket: String,
    },
}

/// Wall-clock budget per orchestrator stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub image_analysis: Duration,
    pub title: Duration,
    pub text: Duration,
    pub audio: Duration,
    pub save: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            image_analysis: Duration::from_secs(120),
            title: Duration::from_secs(60),
            text: Duration::from_secs(300),
            audio: Duration::from_secs(300),
            save: Duration::from_secs(30),
        }
    }
}

/// Provider credentials, model names, storage, and stage budgets.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub text_provider: TextProviderKind,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_text_model: String,
    pub openai_vision_model: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub elevenlabs_api_key: String,
    pub elevenlabs_model: String,
    pub storage: StorageConfig,
    pub stage_timeouts: StageTimeouts,
    /// Timeout applied to every outbound provider HTTP request.
    pub provider_request_timeout: Duration,
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                          |
    /// |---------------------------------|----------------------------------|
    /// | `TEXT_PROVIDER`                 | `openai`                         |
    /// | `OPENAI_API_KEY`                | required                         |
    /// | `OPENAI_BASE_URL`               | `https://api.openai.com/v1`      |
    /// | `OPENAI_TEXT_MODEL`             | `gpt-4o-mini`                    |
    /// | `OPENAI_VISION_MODEL`           | `gpt-4o-mini`                    |
    /// | `GEMINI_API_KEY`                | required when provider is gemini |
    /// | `GEMINI_MODEL`                  | `gemini-2.0-flash`               |
    /// | `ELEVENLABS_API_KEY`            | required                         |
    /// | `ELEVENLABS_MODEL`              | `eleven_multilingual_v2`         |
    /// | `STORAGE_BACKEND`               | `local`                          |
    /// | `LOCAL_STORAGE_DIR`             | `./storage`                      |
    /// | `PUBLIC_ASSET_BASE_URL`         | `http://localhost:3000/assets`   |
    /// | `SUPABASE_URL`                  | required for `supabase`          |
    /// | `SUPABASE_SERVICE_KEY`          | required for `supabase`          |
    /// | `SUPABASE_BUCKET`               | `stories`                        |
    /// | `IMAGE_STAGE_TIMEOUT_SECS`      | `120`                            |
    /// | `TITLE_STAGE_TIMEOUT_SECS`      | `60`                             |
    /// | `TEXT_STAGE_TIMEOUT_SECS`       | `300`                            |
    /// | `AUDIO_STAGE_TIMEOUT_SECS`      | `300`                            |
    /// | `SAVE_STAGE_TIMEOUT_SECS`       | `30`                             |
    /// | `PROVIDER_REQUEST_TIMEOUT_SECS` | `120`                            |
    ///
    /// Panics on missing credentials or malformed values; startup should
    /// fail fast on misconfiguration.
    pub fn from_env() -> Self {
        let text_provider: TextProviderKind = env_or("TEXT_PROVIDER", "openai")
            .parse()
            .unwrap_or_else(|e| panic!("TEXT_PROVIDER is invalid: {e}"));

        let openai_api_key = required("OPENAI_API_KEY");
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty());
        if text_provider == TextProviderKind::Gemini && gemini_api_key.is_none() {
            panic!("GEMINI_API_KEY must be set when TEXT_PROVIDER=gemini");
        }

        let storage = match env_or("STORAGE_BACKEND", "local").to_ascii_lowercase().as_str() {
            "local" => StorageConfig::Local {
                root: PathBuf::from(env_or("LOCAL_STORAGE_DIR", "./storage")),
                public_base_url: env_or("PUBLIC_ASSET_BASE_URL", "http://localhost:3000/assets"),
            },
            "supabase" => StorageConfig::Supabase {
                url: required("SUPABASE_URL"),
                service_key: required("SUPABASE_SERVICE_KEY"),
                bucket: env_or("SUPABASE_BUCKET", "stories"),
            },
            other => panic!("STORAGE_BACKEND must be 'local' or 'supabase', got '{other}'"),
        };

        let stage_timeouts = StageTimeouts {
            image_analysis: secs("IMAGE_STAGE_TIMEOUT_SECS", 120),
            title: secs("TITLE_STAGE_TIMEOUT_SECS", 60),
            text: secs("TEXT_STAGE_TIMEOUT_SECS", 300),
            audio: secs("AUDIO_STAGE_TIMEOUT_SECS", 300),
            save: secs("SAVE_STAGE_TIMEOUT_SECS", 30),
        };

        Self {
            text_provider,
            openai_api_key,
            openai_base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            openai_text_model: env_or("OPENAI_TEXT_MODEL", "gpt-4o-mini"),
            openai_vision_model: env_or("OPENAI_VISION_MODEL", "gpt-4o-mini"),
            gemini_api_key,
            gemini_model: env_or("GEMINI_MODEL", "gemini-2.0-flash"),
            elevenlabs_api_key: required("ELEVENLABS_API_KEY"),
            elevenlabs_model: env_or("ELEVENLABS_MODEL", "eleven_multilingual_v2"),
            storage,
            stage_timeouts,
            provider_request_timeout: secs("PROVIDER_REQUEST_TIMEOUT_SECS", 120),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn required(name: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| panic!("{name} must be set"))
}

fn secs(name: &str, default: u64) -> Duration {
    let value: u64 = env_or(name, &default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{name} must be a valid u64"));
    Duration::from_secs(value)
}
