//! Mock pipeline for development and testing.

use super::{AssetPipeline, PipelineError, PipelineParams};
use crate::models::{glb, DecodedImage};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Produces a small JSON-only GLB describing the request instead of running
/// a model. The output depends only on the image and the sampler settings,
/// never on the seed, so repeated generations are byte-identical.
#[derive(Default)]
pub struct MockPipeline {
    calls: AtomicUsize,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl MockPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a slow GPU run.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Number of `generate` calls so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl AssetPipeline for MockPipeline {
    async fn generate(
        &self,
        image: &DecodedImage,
        params: &PipelineParams,
    ) -> Result<Bytes, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(PipelineError::Api("mock pipeline failure".to_string()));
        }

        tracing::debug!(seed = params.seed, "Mock pipeline generating asset");

        let document = json!({
            "asset": { "version": "2.0", "generator": "asset-service mock pipeline" },
            "extras": {
                "image": image.pixel_hash(),
                "width": image.width(),
                "height": image.height(),
                "steps": params.sparse_structure_sampler.steps,
                "cfg_strength": params.sparse_structure_sampler.cfg_strength,
                "simplify": params.export.simplify,
                "texture_size": params.export.texture_size,
            }
        });

        Ok(Bytes::from(glb::json_only(&document)))
    }

    async fn health_check(&self) -> Result<(), PipelineError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(PipelineError::Unavailable("mock pipeline failing".to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::image::test_support::solid_image;
    use crate::models::GenerationSettings;

    fn sample_image() -> DecodedImage {
        DecodedImage::decode(Bytes::from(solid_image(
            2,
            2,
            [1, 1, 1, 255],
            image::ImageFormat::Png,
        )))
        .unwrap()
    }

    #[tokio::test]
    async fn output_is_glb_and_ignores_seed() {
        let pipeline = MockPipeline::new();
        let image = sample_image();
        let settings = GenerationSettings::default();

        let first = pipeline
            .generate(&image, &PipelineParams::new(&settings, 1))
            .await
            .unwrap();
        let second = pipeline
            .generate(&image, &PipelineParams::new(&settings, 2))
            .await
            .unwrap();

        assert!(glb::is_glb(&first));
        assert_eq!(first, second);
        assert_eq!(pipeline.calls(), 2);
    }

    #[tokio::test]
    async fn failing_mode_errors_and_still_counts() {
        let pipeline = MockPipeline::new();
        pipeline.set_failing(true);

        let result = pipeline
            .generate(
                &sample_image(),
                &PipelineParams::new(&GenerationSettings::default(), 1),
            )
            .await;

        assert!(matches!(result, Err(PipelineError::Api(_))));
        assert!(pipeline.health_check().await.is_err());
        assert_eq!(pipeline.calls(), 1);
    }
}
