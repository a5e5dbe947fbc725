//! Error types for providers and the generation pipeline.

/// Errors from an external model, speech, or storage provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    /// The provider answered successfully but with nothing usable.
    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: &'static str },

    /// Local storage I/O failed.
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A storage key that would escape the storage root.
    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),

    /// A provider endpoint URL could not be built.
    #[error("Invalid provider URL: {0}")]
    InvalidUrl(String),
}

/// Errors from the generation store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Status store unavailable: {0}")]
    Unavailable(String),
}

/// Fatal failures that abort a generation attempt.
///
/// The `Display` string is what gets persisted as the job's error message.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Failed to save generation state: {0}")]
    Store(#[from] StoreError),

    #[error("Audio generation failed: {0}")]
    Audio(ProviderError),

    #[error("{stage} timed out after {secs} seconds")]
    Timeout { stage: &'static str, secs: u64 },

    #[error("Generation was cancelled")]
    Cancelled,

    /// The job row no longer belongs to this attempt (retried, swept as
    /// stale, or deleted). Nothing is written for a superseded attempt.
    #[error("Generation attempt was superseded")]
    Superseded,
}
