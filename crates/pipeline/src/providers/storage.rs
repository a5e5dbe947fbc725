//! Asset storage backends: local filesystem and Supabase Storage.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::{ensure_success, AssetStorage};
use crate::error::ProviderError;

// ---------------------------------------------------------------------------
// Local filesystem
// ---------------------------------------------------------------------------

/// Stores objects as files under `root`; public URLs are `base_url/key`.
pub struct LocalStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub fn new(root: PathBuf, public_base_url: String) -> Self {
        Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve `key` inside the root, rejecting absolute paths and `..`.
    fn path_for(&self, key: &str) -> Result<PathBuf, ProviderError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(ProviderError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl AssetStorage for LocalStorage {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, ProviderError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(format!("{}/{key}", self.public_base_url))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ProviderError> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::read(path).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), ProviderError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Supabase Storage
// ---------------------------------------------------------------------------

const SUPABASE: &str = "supabase";

/// Supabase Storage REST client for a single bucket.
pub struct SupabaseStorage {
    client: reqwest::Client,
    url: String,
    service_key: String,
    bucket: String,
}

impl SupabaseStorage {
    /// * `url` - Project URL, e.g. `https://abc.supabase.co`.
    pub fn with_client(
        client: reqwest::Client,
        url: String,
        service_key: String,
        bucket: String,
    ) -> Self {
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            service_key,
            bucket,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{key}", self.url, self.bucket)
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{key}", self.url, self.bucket)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }
}

#[async_trait]
impl AssetStorage for SupabaseStorage {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ProviderError> {
        let response = self
            .authorized(self.client.post(self.object_url(key)))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        ensure_success(SUPABASE, response).await?;
        Ok(self.public_url(key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ProviderError> {
        let response = self
            .authorized(self.client.get(self.object_url(key)))
            .send()
            .await?;
        let bytes = ensure_success(SUPABASE, response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, key: &str) -> Result<(), ProviderError> {
        let response = self
            .authorized(
                self.client
                    .delete(format!("{}/storage/v1/object/{}", self.url, self.bucket)),
            )
            .json(&serde_json::json!({ "prefixes": [key] }))
            .send()
            .await?;
        ensure_success(SUPABASE, response).await?;
        Ok(())
    }
}
