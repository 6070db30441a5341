//! Image-to-3D pipeline abstraction.
//!
//! Inference, mesh simplification and texture baking happen outside this
//! service. The handle is built once at startup and shared for the lifetime
//! of the process; implementations must serialise GPU work themselves.

pub mod mock;
pub mod remote;

use crate::models::{DecodedImage, GenerationSettings};
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use mock::MockPipeline;
pub use remote::{RemotePipeline, RemotePipelineConfig};

/// Error type for pipeline operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Pipeline unavailable: {0}")]
    Unavailable(String),

    #[error("Pipeline error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Pipeline returned an invalid asset: {0}")]
    InvalidOutput(String),
}

/// Sampler parameters for one diffusion stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerParams {
    pub steps: u32,
    pub cfg_strength: f64,
}

/// How the generated scene is turned into a GLB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportOptions {
    /// Ratio of triangles removed during simplification.
    pub simplify: f64,
    pub texture_size: u32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            simplify: 0.95,
            texture_size: 1024,
        }
    }
}

/// Everything the pipeline needs besides the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineParams {
    pub seed: u64,
    pub sparse_structure_sampler: SamplerParams,
    pub export: ExportOptions,
}

impl PipelineParams {
    pub fn new(settings: &GenerationSettings, seed: u64) -> Self {
        Self {
            seed,
            sparse_structure_sampler: SamplerParams {
                steps: settings.sparse_structure_sampler_steps,
                cfg_strength: settings.sparse_structure_sampler_cfg_strength,
            },
            export: ExportOptions::default(),
        }
    }
}

#[async_trait]
pub trait AssetPipeline: Send + Sync {
    /// Run generation and export, returning the GLB buffer.
    async fn generate(
        &self,
        image: &DecodedImage,
        params: &PipelineParams,
    ) -> Result<Bytes, PipelineError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), PipelineError>;
}
