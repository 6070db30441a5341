use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default upload limit (20MB).
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub cache: CacheConfig,
    pub pipeline: PipelineConfig,
    pub storage: SampleStorageConfig,
    pub max_upload_bytes: usize,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub backend: PipelineBackend,
    pub endpoint: String,
    /// Unset means requests to the pipeline are never cut short.
    pub timeout_secs: Option<u64>,
}

impl PipelineConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Location of the canned asset served by `/asset-from-storage/`.
#[derive(Debug, Clone, Deserialize)]
pub struct SampleStorageConfig {
    pub sample_asset_path: PathBuf,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PipelineBackend {
    Remote,
    Mock,
}

impl AssetConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;

        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(AssetConfig {
            common: common_config,
            cache: CacheConfig {
                dir: get_env("CACHE_DIR", Some(".cache"), is_prod)?.into(),
            },
            pipeline: PipelineConfig {
                backend: get_env("PIPELINE_BACKEND", Some("remote"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                endpoint: get_env("PIPELINE_ENDPOINT", Some("http://127.0.0.1:9000"), is_prod)?,
                timeout_secs: parse_optional("PIPELINE_TIMEOUT_SECS")?,
            },
            storage: SampleStorageConfig {
                sample_asset_path: get_env("SAMPLE_ASSET_PATH", Some("sample.glb"), is_prod)?
                    .into(),
            },
            max_upload_bytes: parse_optional("MAX_UPLOAD_BYTES")?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
        })
    }
}

impl std::str::FromStr for PipelineBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "remote" => Ok(PipelineBackend::Remote),
            "mock" => Ok(PipelineBackend::Mock),
            _ => Err(format!("Invalid pipeline backend: {}", s)),
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod && default.is_none() {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_optional<T>(key: &str) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) if !val.trim().is_empty() => val.trim().parse().map(Some).map_err(|e: T::Err| {
            AppError::ConfigError(anyhow::anyhow!("{} is not valid: {}", key, e))
        }),
        _ => Ok(None),
    }
}
