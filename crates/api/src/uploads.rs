//! Validation and storage of uploaded story images.

use image::ImageFormat;
use lullaby_core::analysis::ImageAsset;
use lullaby_pipeline::providers::AssetStorage;

use crate::error::{AppError, AppResult};

/// An image received in a create request, not yet stored.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl ImageUpload {
    /// Sniff the format from the file header. Only PNG, JPEG and WebP are
    /// accepted; the declared content type is ignored.
    pub fn sniff(bytes: Vec<u8>, file_name: Option<&str>) -> AppResult<Self> {
        let label = file_name.unwrap_or("image");
        if bytes.is_empty() {
            return Err(AppError::BadRequest(format!("{label} is empty")));
        }
        match image::guess_format(&bytes) {
            Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP)) => {
                Ok(Self { bytes, format })
            }
            _ => Err(AppError::BadRequest(format!(
                "{label} is not a PNG, JPEG or WebP image"
            ))),
        }
    }

    pub fn content_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("bin")
    }
}

/// Store each upload under a fresh key, preserving order.
///
/// When one upload fails, the ones already stored are removed again.
pub async fn store_all(
    storage: &dyn AssetStorage,
    uploads: Vec<ImageUpload>,
) -> AppResult<Vec<ImageAsset>> {
    let mut stored: Vec<ImageAsset> = Vec::with_capacity(uploads.len());

    for upload in uploads {
        let key = format!("uploads/{}.{}", uuid::Uuid::now_v7(), upload.extension());
        let content_type = upload.content_type();
        match storage.put(&key, upload.bytes, content_type).await {
            Ok(url) => stored.push(ImageAsset {
                key,
                url,
                content_type: content_type.to_string(),
            }),
            Err(e) => {
                let keys: Vec<&str> = stored.iter().map(|a| a.key.as_str()).collect();
                remove_all(storage, keys).await;
                return Err(e.into());
            }
        }
    }

    Ok(stored)
}

/// Best-effort removal of stored objects; failures are only logged.
pub async fn remove_all<'a>(storage: &dyn AssetStorage, keys: impl IntoIterator<Item = &'a str>) {
    for key in keys {
        if let Err(e) = storage.delete(key).await {
            tracing::warn!(key, error = %e, "Failed to remove stored asset");
        }
    }
}
