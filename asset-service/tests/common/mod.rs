#![allow(dead_code)]

use asset_service::config::{
    AssetConfig, CacheConfig, PipelineBackend, PipelineConfig, SampleStorageConfig,
};
use asset_service::models::{DecodedImage, GenerationSettings};
use asset_service::services::{CacheKey, MockPipeline};
use asset_service::startup::Application;
use bytes::Bytes;
use image::{ImageFormat, Rgba, RgbaImage};
use reqwest::multipart;
use service_core::config::Config as CoreConfig;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

pub const SAMPLE_ASSET: &[u8] = b"glTF-sample-asset-for-tests";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub pipeline: Arc<MockPipeline>,
    pub cache_dir: PathBuf,
    pub sample_path: PathBuf,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(MockPipeline::new()).await
    }

    pub async fn spawn_with(pipeline: MockPipeline) -> Self {
        let cache_dir = PathBuf::from(format!("target/test-cache-{}", Uuid::new_v4()));
        let sample_path = PathBuf::from(format!("target/test-sample-{}.glb", Uuid::new_v4()));
        tokio::fs::create_dir_all("target")
            .await
            .expect("Failed to create target directory");
        tokio::fs::write(&sample_path, SAMPLE_ASSET)
            .await
            .expect("Failed to write sample asset");

        let config = AssetConfig {
            common: CoreConfig {
                port: 0, // Random port for testing
                log_level: "info".to_string(),
            },
            cache: CacheConfig {
                dir: cache_dir.clone(),
            },
            pipeline: PipelineConfig {
                backend: PipelineBackend::Mock,
                endpoint: String::new(),
                timeout_secs: None,
            },
            storage: SampleStorageConfig {
                sample_asset_path: sample_path.clone(),
            },
            max_upload_bytes: 1024 * 1024,
            otlp_endpoint: None,
        };

        let pipeline = Arc::new(pipeline);
        let app = Application::build_with_pipeline(config, pipeline.clone())
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        TestApp {
            address,
            port,
            pipeline,
            cache_dir,
            sample_path,
            client: reqwest::Client::new(),
        }
    }

    pub async fn post_image(&self, path: &str, image: Vec<u8>, query: &str) -> reqwest::Response {
        self.post_form(path, image_form(image), query).await
    }

    pub async fn post_form(
        &self,
        path: &str,
        form: multipart::Form,
        query: &str,
    ) -> reqwest::Response {
        let url = if query.is_empty() {
            format!("{}{}", self.address, path)
        } else {
            format!("{}{}?{}", self.address, path, query)
        };

        self.client
            .post(url)
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Where the cache entry for this upload and settings must live.
    pub fn expected_cache_path(&self, image: &[u8], settings: &GenerationSettings) -> PathBuf {
        let decoded =
            DecodedImage::decode(Bytes::copy_from_slice(image)).expect("Test image must decode");
        self.cache_dir
            .join(CacheKey::derive(settings, &decoded).file_name())
    }

    /// File names currently in the cache directory.
    pub async fn cache_entries(&self) -> Vec<String> {
        let mut names = Vec::new();
        let Ok(mut dir) = tokio::fs::read_dir(&self.cache_dir).await else {
            return names;
        };
        while let Some(entry) = dir.next_entry().await.expect("Failed to list cache") {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        names
    }

    pub async fn cleanup(&self) {
        let _ = tokio::fs::remove_dir_all(&self.cache_dir).await;
        let _ = tokio::fs::remove_file(&self.sample_path).await;
    }
}

pub fn image_form(image: Vec<u8>) -> multipart::Form {
    multipart::Form::new().part(
        "image_file",
        multipart::Part::bytes(image)
            .file_name("input.png")
            .mime_str("image/png")
            .unwrap(),
    )
}

/// A small solid-colour PNG.
pub fn png(rgba: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(8, 8, Rgba(rgba));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}
