pub mod assets;
pub mod health;

pub use assets::{asset_from_image, asset_from_storage};
pub use health::{health_check, metrics_endpoint, welcome};
