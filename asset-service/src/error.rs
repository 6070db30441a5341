use crate::services::cache::CacheError;
use crate::services::pipeline::PipelineError;
use service_core::error::AppError;
use thiserror::Error;

/// Failures of the asset request path, one variant per boundary.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("could not decode uploaded image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("generation failed: {0}")]
    Generate(#[from] PipelineError),

    #[error("cache access failed: {0}")]
    Cache(#[from] CacheError),
}

impl From<AssetError> for AppError {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::Decode(e) => {
                AppError::BadRequest(anyhow::anyhow!("Invalid image upload: {}", e))
            }
            AssetError::Generate(PipelineError::Unavailable(msg)) => {
                tracing::warn!(error = %msg, "Pipeline unavailable");
                AppError::ServiceUnavailable
            }
            AssetError::Generate(e) => AppError::BadGateway(e.to_string()),
            AssetError::Cache(e) => AppError::StorageError(anyhow::Error::new(e)),
        }
    }
}
