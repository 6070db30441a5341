use bytes::Bytes;
use service_core::error::AppError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// A pre-generated asset on local disk, served without touching the
/// pipeline so consumers can integrate without GPU cost.
#[derive(Debug, Clone)]
pub struct SampleAsset {
    path: PathBuf,
}

impl SampleAsset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Bytes, AppError> {
        match fs::read(&self.path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::NotFound(anyhow::anyhow!(
                "Sample asset {} not found",
                self.path.display()
            ))),
            Err(e) => Err(AppError::StorageError(anyhow::Error::new(e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn loads_file_contents() {
        let path = std::env::temp_dir().join(format!("sample-{}.glb", Uuid::new_v4()));
        fs::write(&path, b"sample-glb").await.unwrap();

        let data = SampleAsset::new(&path).load().await.unwrap();

        assert_eq!(data.as_ref(), b"sample-glb");
        let _ = fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let asset = SampleAsset::new(std::env::temp_dir().join("no-such-sample.glb"));
        assert!(matches!(asset.load().await, Err(AppError::NotFound(_))));
    }
}
