//! Image encoding: `DynamicImage` → JPEG bytes → base64 for the request body.
//!
//! JPEG at quality 85 keeps a 2× A4 render in the low hundreds of kilobytes,
//! which matters because the image travels base64-inflated inside a JSON body
//! to the model server on every request. Text stays legible at that quality.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

/// JPEG quality used for every rendered page.
pub const JPEG_QUALITY: u8 = 85;

/// An encoded page ready to attach to a model request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Base64 (standard alphabet, padded) of the JPEG bytes.
    pub base64: String,
    pub mime_type: &'static str,
}

impl EncodedImage {
    pub fn from_jpeg(bytes: &[u8]) -> Self {
        let base64 = STANDARD.encode(bytes);
        debug!("Encoded image → {} bytes base64", base64.len());
        Self {
            base64,
            mime_type: "image/jpeg",
        }
    }
}

/// Encode a rasterised page as JPEG at [`JPEG_QUALITY`].
///
/// The alpha channel is dropped first; JPEG has none.
pub fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    encoder.encode_image(&rgb)?;
    Ok(buf)
}
