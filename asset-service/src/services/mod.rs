pub mod cache;
pub mod generator;
pub mod metrics;
pub mod pipeline;
pub mod sample;

pub use cache::{AssetCache, CacheKey};
pub use generator::{AssetGenerator, CacheStatus, GeneratedAsset};
pub use metrics::{get_metrics, init_metrics};
pub use pipeline::{AssetPipeline, MockPipeline, RemotePipeline};
pub use sample::SampleAsset;
