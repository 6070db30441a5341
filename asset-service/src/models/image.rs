use bytes::Bytes;
use image::{ColorType, DynamicImage};
use sha2::{Digest, Sha256};

/// An uploaded image decoded into memory.
///
/// The raw pixel buffer (in the decoder's native layout) identifies the image
/// for caching, so the same picture re-encoded with different compression
/// settings still maps to the same entry. Dimensions and colour type are
/// not part of the digest: same-sized buffers with equal bytes share a hash.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    color: ColorType,
    pixels: Vec<u8>,
    encoded: Bytes,
    format: Option<image::ImageFormat>,
}

impl DecodedImage {
    pub fn decode(encoded: Bytes) -> Result<Self, image::ImageError> {
        let format = image::guess_format(&encoded).ok();
        let img = image::load_from_memory(&encoded)?;
        Ok(Self::from_dynamic(img, encoded, format))
    }

    fn from_dynamic(img: DynamicImage, encoded: Bytes, format: Option<image::ImageFormat>) -> Self {
        let width = img.width();
        let height = img.height();
        let color = img.color();
        let pixels = img.into_bytes();

        Self {
            width,
            height,
            color,
            pixels,
            encoded,
            format,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn color(&self) -> ColorType {
        self.color
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// The bytes exactly as uploaded.
    pub fn encoded(&self) -> &Bytes {
        &self.encoded
    }

    pub fn mime_type(&self) -> &'static str {
        self.format
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream")
    }

    /// Hex SHA-256 over the raw pixel bytes only.
    pub fn pixel_hash(&self) -> String {
        hex::encode(Sha256::digest(&self.pixels))
    }
}
