//! Per-image scene analysis with per-item failure isolation.

use std::sync::Arc;

use futures::future::join_all;
use lullaby_core::analysis::{ImageAnalysis, ImageAsset};
use lullaby_core::prompts::VISION_INSTRUCTIONS;

use crate::error::ProviderError;
use crate::providers::{AssetStorage, VisionModel};

/// Analyzes uploaded images with a vision model.
pub struct ImageAnalyzer {
    vision: Arc<dyn VisionModel>,
    storage: Arc<dyn AssetStorage>,
}

impl ImageAnalyzer {
    pub fn new(vision: Arc<dyn VisionModel>, storage: Arc<dyn AssetStorage>) -> Self {
        Self { vision, storage }
    }

    /// Analyze every image concurrently.
    ///
    /// Always returns one record per input, in input order. An image that
    /// cannot be fetched or described yields a placeholder at its position.
    pub async fn analyze(&self, images: &[ImageAsset]) -> Vec<ImageAnalysis> {
        join_all(
            images
                .iter()
                .enumerate()
                .map(|(index, image)| self.analyze_one(index, image)),
        )
        .await
    }

    async fn analyze_one(&self, index: usize, image: &ImageAsset) -> ImageAnalysis {
        match self.describe(image).await {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!(
                    index,
                    key = %image.key,
                    error = %e,
                    "Image analysis failed, using placeholder",
                );
                ImageAnalysis::placeholder()
            }
        }
    }

    async fn describe(&self, image: &ImageAsset) -> Result<ImageAnalysis, ProviderError> {
        let bytes = self.storage.get(&image.key).await?;
        let reply = self
            .vision
            .describe_image(&bytes, &image.content_type, VISION_INSTRUCTIONS)
            .await?;
        Ok(ImageAnalysis::from_model_reply(&reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeVision, MemoryStorage};

    fn asset(key: &str) -> ImageAsset {
        ImageAsset {
            key: key.to_string(),
            url: format!("memory://{key}"),
            content_type: "image/png".into(),
        }
    }

    async fn analyzer_with(images: &[(&str, &[u8])]) -> (ImageAnalyzer, Arc<FakeVision>) {
        let storage = Arc::new(MemoryStorage::default());
        for (key, bytes) in images {
            storage.put(key, bytes.to_vec(), "image/png").await.unwrap();
        }
        let vision = Arc::new(FakeVision::default());
        (ImageAnalyzer::new(vision.clone(), storage), vision)
    }

    #[tokio::test]
    async fn one_record_per_image_with_placeholder_for_failure() {
        let (analyzer, vision) =
            analyzer_with(&[("a", b"png-1"), ("b", b"corrupt"), ("c", b"png-333")]).await;

        let analyses = analyzer
            .analyze(&[asset("a"), asset("b"), asset("c")])
            .await;

        assert_eq!(analyses.len(), 3);
        assert_eq!(analyses[0].description, "A garden scene (5 bytes)");
        assert!(analyses[1].placeholder);
        assert_eq!(analyses[2].description, "A garden scene (7 bytes)");
        assert_eq!(vision.calls(), 3);
    }

    #[tokio::test]
    async fn missing_object_becomes_placeholder() {
        let (analyzer, vision) = analyzer_with(&[]).await;
        let analyses = analyzer.analyze(&[asset("gone")]).await;
        assert_eq!(analyses.len(), 1);
        assert!(analyses[0].placeholder);
        assert_eq!(vision.calls(), 0);
    }

    #[tokio::test]
    async fn no_images_no_calls() {
        let (analyzer, vision) = analyzer_with(&[]).await;
        assert!(analyzer.analyze(&[]).await.is_empty());
        assert_eq!(vision.calls(), 0);
    }
}
