pub mod glb;
pub mod image;
pub mod settings;

pub use self::glb::GLB_MIME_TYPE;
pub use self::image::DecodedImage;
pub use self::settings::GenerationSettings;
