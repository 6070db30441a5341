//! Cache-or-generate orchestration for a single asset request.

use crate::error::AssetError;
use crate::models::{DecodedImage, GenerationSettings};
use crate::services::cache::{AssetCache, CacheKey};
use crate::services::metrics;
use crate::services::pipeline::{AssetPipeline, PipelineParams};
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Which branch produced the asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedAsset {
    pub key: CacheKey,
    pub bytes: Bytes,
    pub cache: CacheStatus,
}

type InFlightMap = DashMap<CacheKey, Arc<Mutex<()>>>;

pub struct AssetGenerator {
    cache: AssetCache,
    pipeline: Arc<dyn AssetPipeline>,
    in_flight: InFlightMap,
}

impl AssetGenerator {
    pub fn new(cache: AssetCache, pipeline: Arc<dyn AssetPipeline>) -> Self {
        Self {
            cache,
            pipeline,
            in_flight: DashMap::new(),
        }
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    pub fn pipeline(&self) -> &Arc<dyn AssetPipeline> {
        &self.pipeline
    }

    /// Keys with a generation currently running or waited on.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Serve the asset for (settings, image) from cache, generating and
    /// storing it first when absent.
    ///
    /// At most one generation runs per key. Requests arriving while it runs
    /// wait for it and are then answered from the cache.
    pub async fn get_or_generate(
        &self,
        settings: &GenerationSettings,
        image: &DecodedImage,
    ) -> Result<GeneratedAsset, AssetError> {
        let seed = settings.resolve_seed();
        let key = CacheKey::derive(settings, image);

        if let Some(bytes) = self.cache.lookup(&key).await? {
            tracing::info!(cache_key = %key, "Returning asset from cache");
            metrics::record_cache_hit();
            return Ok(GeneratedAsset {
                key,
                bytes,
                cache: CacheStatus::Hit,
            });
        }

        let slot = InFlightSlot::claim(&self.in_flight, &key);
        let _permit = slot.lock().await;

        // Another request may have finished this key while we waited.
        if let Some(bytes) = self.cache.lookup(&key).await? {
            tracing::info!(cache_key = %key, "Asset produced by concurrent request");
            metrics::record_cache_hit();
            return Ok(GeneratedAsset {
                key,
                bytes,
                cache: CacheStatus::Hit,
            });
        }

        tracing::info!(cache_key = %key, seed, "Cache miss, generating asset");
        metrics::record_cache_miss();

        let params = PipelineParams::new(settings, seed);
        let start = Instant::now();
        let bytes = match self.pipeline.generate(image, &params).await {
            Ok(bytes) => bytes,
            Err(e) => {
                metrics::record_generation("error", start.elapsed().as_secs_f64());
                tracing::error!(cache_key = %key, seed, error = %e, "Asset generation failed");
                return Err(e.into());
            }
        };
        metrics::record_generation("ok", start.elapsed().as_secs_f64());

        tracing::info!(
            cache_key = %key,
            seed,
            size = bytes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Asset generated"
        );

        self.cache.store(&key, &bytes).await?;

        Ok(GeneratedAsset {
            key,
            bytes,
            cache: CacheStatus::Miss,
        })
    }
}

/// Membership in the per-key lock map.
///
/// Dropping the slot removes the map entry once no other request holds it,
/// including when the owning request is cancelled mid-generation.
struct InFlightSlot<'a> {
    map: &'a InFlightMap,
    key: CacheKey,
    mutex: Arc<Mutex<()>>,
}

impl<'a> InFlightSlot<'a> {
    fn claim(map: &'a InFlightMap, key: &CacheKey) -> Self {
        let mutex = map.entry(key.clone()).or_default().value().clone();
        Self {
            map,
            key: key.clone(),
            mutex,
        }
    }

    async fn lock(&self) -> OwnedMutexGuard<()> {
        self.mutex.clone().lock_owned().await
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        // One reference in the map plus ours means nobody else is waiting.
        self.map
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) <= 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::image::test_support::solid_image;
    use crate::services::pipeline::MockPipeline;
    use std::time::Duration;
    use uuid::Uuid;

    fn generator(pipeline: Arc<MockPipeline>) -> AssetGenerator {
        let dir = std::env::temp_dir().join(format!("asset-generator-test-{}", Uuid::new_v4()));
        AssetGenerator::new(AssetCache::new(dir), pipeline)
    }

    fn decoded(rgba: [u8; 4]) -> DecodedImage {
        DecodedImage::decode(Bytes::from(solid_image(
            4,
            4,
            rgba,
            image::ImageFormat::Png,
        )))
        .unwrap()
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache() {
        let pipeline = Arc::new(MockPipeline::new());
        let generator = generator(pipeline.clone());
        let settings = GenerationSettings::default();
        let image = decoded([10, 10, 10, 255]);

        let first = generator.get_or_generate(&settings, &image).await.unwrap();
        let second = generator.get_or_generate(&settings, &image).await.unwrap();

        assert_eq!(first.cache, CacheStatus::Miss);
        assert_eq!(second.cache, CacheStatus::Hit);
        assert_eq!(first.bytes, second.bytes);
        assert_eq!(pipeline.calls(), 1);
        assert!(generator.cache().path_for(&first.key).is_file());
        assert_eq!(generator.in_flight(), 0);

        let _ = tokio::fs::remove_dir_all(generator.cache().dir()).await;
    }

    #[tokio::test]
    async fn changed_settings_miss_the_cache() {
        let pipeline = Arc::new(MockPipeline::new());
        let generator = generator(pipeline.clone());
        let image = decoded([20, 20, 20, 255]);
        let base = GenerationSettings::default();
        let more_steps = GenerationSettings {
            sparse_structure_sampler_steps: 13,
            ..base.clone()
        };

        let a = generator.get_or_generate(&base, &image).await.unwrap();
        let b = generator.get_or_generate(&more_steps, &image).await.unwrap();

        assert_ne!(a.key, b.key);
        assert_eq!(b.cache, CacheStatus::Miss);
        assert_eq!(pipeline.calls(), 2);

        let _ = tokio::fs::remove_dir_all(generator.cache().dir()).await;
    }

    #[tokio::test]
    async fn pipeline_failure_caches_nothing() {
        let pipeline = Arc::new(MockPipeline::new());
        pipeline.set_failing(true);
        let generator = generator(pipeline.clone());
        let settings = GenerationSettings::default();
        let image = decoded([30, 30, 30, 255]);

        let err = generator
            .get_or_generate(&settings, &image)
            .await
            .unwrap_err();

        assert!(matches!(err, AssetError::Generate(_)));
        let key = CacheKey::derive(&settings, &image);
        assert!(!generator.cache().path_for(&key).exists());
        assert_eq!(generator.in_flight(), 0);

        pipeline.set_failing(false);
        let retry = generator.get_or_generate(&settings, &image).await.unwrap();
        assert_eq!(retry.cache, CacheStatus::Miss);
        assert_eq!(pipeline.calls(), 2);

        let _ = tokio::fs::remove_dir_all(generator.cache().dir()).await;
    }

    #[tokio::test]
    async fn concurrent_identical_requests_generate_once() {
        let pipeline = Arc::new(MockPipeline::with_delay(Duration::from_millis(200)));
        let generator = Arc::new(generator(pipeline.clone()));
        let settings = GenerationSettings::default();
        let image = decoded([40, 40, 40, 255]);

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let generator = generator.clone();
                let settings = settings.clone();
                let image = image.clone();
                tokio::spawn(async move { generator.get_or_generate(&settings, &image).await })
            })
            .collect();

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap().unwrap());
        }

        assert_eq!(pipeline.calls(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| r.cache == CacheStatus::Miss)
                .count(),
            1
        );
        assert!(results.windows(2).all(|w| w[0].bytes == w[1].bytes));
        assert_eq!(generator.in_flight(), 0);

        let _ = tokio::fs::remove_dir_all(generator.cache().dir()).await;
    }

    #[tokio::test]
    async fn cancelled_request_releases_its_slot() {
        let pipeline = Arc::new(MockPipeline::with_delay(Duration::from_secs(5)));
        let generator = generator(pipeline.clone());
        let settings = GenerationSettings::default();
        let image = decoded([50, 50, 50, 255]);

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            generator.get_or_generate(&settings, &image),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(generator.in_flight(), 0);
    }
}
