//! HTTP client for a pipeline worker.
//!
//! The worker hosts the model on the GPU and exposes
//! `POST /generate` (multipart image plus parameters, GLB response body) and
//! `GET /health`.

use super::{AssetPipeline, PipelineError, PipelineParams};
use crate::models::glb;
use crate::models::DecodedImage;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RemotePipelineConfig {
    pub endpoint: String,
    pub timeout: Option<Duration>,
}

pub struct RemotePipeline {
    config: RemotePipelineConfig,
    client: Client,
}

impl RemotePipeline {
    pub fn new(config: RemotePipelineConfig) -> Result<Self, PipelineError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| PipelineError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn build_form(image: &DecodedImage, params: &PipelineParams) -> Result<Form, PipelineError> {
        let image_part = Part::bytes(image.encoded().to_vec())
            .file_name("image")
            .mime_str(image.mime_type())
            .map_err(|e| PipelineError::Api(format!("Invalid image MIME type: {}", e)))?;

        Ok(Form::new()
            .part("image", image_part)
            .text("seed", params.seed.to_string())
            .text(
                "sparse_structure_sampler_steps",
                params.sparse_structure_sampler.steps.to_string(),
            )
            .text(
                "sparse_structure_sampler_cfg_strength",
                params.sparse_structure_sampler.cfg_strength.to_string(),
            )
            .text("simplify", params.export.simplify.to_string())
            .text("texture_size", params.export.texture_size.to_string()))
    }
}

#[async_trait]
impl AssetPipeline for RemotePipeline {
    async fn generate(
        &self,
        image: &DecodedImage,
        params: &PipelineParams,
    ) -> Result<Bytes, PipelineError> {
        let form = Self::build_form(image, params)?;

        tracing::debug!(
            endpoint = %self.config.endpoint,
            width = image.width(),
            height = image.height(),
            seed = params.seed,
            "Sending generation request to pipeline"
        );

        let response = self
            .client
            .post(self.url("generate"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| PipelineError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
            {
                return Err(PipelineError::Unavailable(format!(
                    "pipeline responded {}: {}",
                    status, error_text
                )));
            }

            return Err(PipelineError::Api(format!(
                "pipeline responded {}: {}",
                status, error_text
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| PipelineError::Network(format!("Failed to read response: {}", e)))?;

        if !glb::is_glb(&body) {
            return Err(PipelineError::InvalidOutput(format!(
                "{} bytes without a GLB header",
                body.len()
            )));
        }

        Ok(body)
    }

    async fn health_check(&self) -> Result<(), PipelineError> {
        let response = self
            .client
            .get(self.url("health"))
            .send()
            .await
            .map_err(|e| PipelineError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(PipelineError::Unavailable(format!(
                "health probe returned {}",
                response.status()
            )))
        }
    }
}
