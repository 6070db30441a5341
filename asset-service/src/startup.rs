//! Application startup and lifecycle management.

use crate::config::{AssetConfig, PipelineBackend};
use crate::handlers;
use crate::services::pipeline::{
    AssetPipeline, MockPipeline, PipelineError, RemotePipeline, RemotePipelineConfig,
};
use crate::services::{AssetCache, AssetGenerator, SampleAsset};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: AssetConfig,
    pub generator: Arc<AssetGenerator>,
    pub sample: SampleAsset,
}

/// Construct the pipeline selected by configuration.
///
/// Called once per process; the returned handle is shared by every request.
pub fn build_pipeline(config: &AssetConfig) -> Result<Arc<dyn AssetPipeline>, AppError> {
    match config.pipeline.backend {
        PipelineBackend::Remote => {
            let pipeline = RemotePipeline::new(RemotePipelineConfig {
                endpoint: config.pipeline.endpoint.clone(),
                timeout: config.pipeline.timeout(),
            })
            .map_err(|e: PipelineError| AppError::ConfigError(anyhow::Error::new(e)))?;
            tracing::info!(
                endpoint = %config.pipeline.endpoint,
                timeout_secs = ?config.pipeline.timeout_secs,
                "Initialized remote pipeline"
            );
            Ok(Arc::new(pipeline))
        }
        PipelineBackend::Mock => {
            tracing::warn!("Using mock pipeline; generated assets are placeholders");
            Ok(Arc::new(MockPipeline::new()))
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::welcome))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/asset-from-image/", post(handlers::asset_from_image))
        .route("/asset-from-storage/", post(handlers::asset_from_storage))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    server: Box<dyn Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    /// Build the application with the pipeline selected by configuration.
    pub async fn build(config: AssetConfig) -> Result<Self, AppError> {
        let pipeline = build_pipeline(&config)?;
        Self::build_with_pipeline(config, pipeline).await
    }

    /// Build the application around an already constructed pipeline handle.
    pub async fn build_with_pipeline(
        config: AssetConfig,
        pipeline: Arc<dyn AssetPipeline>,
    ) -> Result<Self, AppError> {
        Self::build_inner(config, pipeline, None).await
    }

    /// Like [`Application::build_with_pipeline`], stopping when `shutdown`
    /// resolves.
    pub async fn build_with_shutdown<F>(
        config: AssetConfig,
        pipeline: Arc<dyn AssetPipeline>,
        shutdown: F,
    ) -> Result<Self, AppError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self::build_inner(config, pipeline, Some(Box::pin(shutdown))).await
    }

    async fn build_inner(
        config: AssetConfig,
        pipeline: Arc<dyn AssetPipeline>,
        shutdown: Option<std::pin::Pin<Box<dyn Future<Output = ()> + Send>>>,
    ) -> Result<Self, AppError> {
        let cache = AssetCache::new(&config.cache.dir);
        tracing::info!(cache_dir = %cache.dir().display(), "Using asset cache directory");

        let state = AppState {
            config: config.clone(),
            generator: Arc::new(AssetGenerator::new(cache, pipeline)),
            sample: SampleAsset::new(&config.storage.sample_asset_path),
        };

        let app = router(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server: Box<dyn Future<Output = std::io::Result<()>> + Send + Unpin> = match shutdown
        {
            Some(signal) => Box::new(
                axum::serve(listener, app)
                    .with_graceful_shutdown(signal)
                    .into_future(),
            ),
            None => Box::new(axum::serve(listener, app).into_future()),
        };

        Ok(Self {
            port,
            server,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
