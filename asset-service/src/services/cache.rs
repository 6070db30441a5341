//! Content-addressed store for generated assets.
//!
//! Entries live as `{image_hash}_{settings_hash}.bin` directly under the cache
//! directory. The directory listing is the only index; nothing is ever
//! evicted by the service.

use crate::models::{DecodedImage, GenerationSettings};
use bytes::Bytes;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const ENTRY_EXTENSION: &str = "bin";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Identity of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    image_hash: String,
    settings_hash: String,
}

impl CacheKey {
    pub fn derive(settings: &GenerationSettings, image: &DecodedImage) -> Self {
        Self {
            image_hash: image.pixel_hash(),
            settings_hash: settings.settings_hash(),
        }
    }

    pub fn image_hash(&self) -> &str {
        &self.image_hash
    }

    pub fn settings_hash(&self) -> &str {
        &self.settings_hash
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self, ENTRY_EXTENSION)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.image_hash, self.settings_hash)
    }
}

#[derive(Debug, Clone)]
pub struct AssetCache {
    dir: PathBuf,
}

impl AssetCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Return the stored asset for `key`, or `None` when there is no regular
    /// file at its path.
    ///
    /// Content is not validated: an empty or truncated file is still a hit.
    pub async fn lookup(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheError> {
        let path = self.path_for(key);

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(&path, e)),
        }

        match fs::read(&path).await {
            Ok(data) => {
                tracing::info!(cache_key = %key, size = data.len(), "Found asset in cache");
                Ok(Some(Bytes::from(data)))
            }
            // Removed between the metadata check and the read.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    /// Persist `data` under `key`, replacing any existing entry.
    ///
    /// The bytes go to a uniquely named temporary file in the cache directory
    /// which is renamed over the final path once fully written, so readers see
    /// either the previous entry or the complete new one. The temporary file
    /// is removed on every failure path.
    pub async fn store(&self, key: &CacheKey, data: &[u8]) -> Result<PathBuf, CacheError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CacheError::io(&self.dir, e))?;

        let path = self.path_for(key);
        let tmp_path = self
            .dir
            .join(format!(".{}.{}.tmp", key.file_name(), Uuid::new_v4()));

        tracing::info!(cache_key = %key, size = data.len(), "Caching generated asset");

        if let Err(e) = write_then_rename(&tmp_path, &path, data).await {
            if let Err(cleanup) = fs::remove_file(&tmp_path).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    tracing::warn!(
                        tmp_path = %tmp_path.display(),
                        error = %cleanup,
                        "Failed to remove temporary cache file"
                    );
                }
            }
            return Err(e);
        }

        Ok(path)
    }
}

async fn write_then_rename(tmp_path: &Path, path: &Path, data: &[u8]) -> Result<(), CacheError> {
    let mut file = fs::File::create(tmp_path)
        .await
        .map_err(|e| CacheError::io(tmp_path, e))?;
    file.write_all(data)
        .await
        .map_err(|e| CacheError::io(tmp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| CacheError::io(tmp_path, e))?;
    drop(file);

    fs::rename(tmp_path, path)
        .await
        .map_err(|e| CacheError::io(path, e))
}
