//! Decoding and PNG re-encoding of uploaded and generated images.

use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Image decode error: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Image encode error: {0}")]
    Encode(#[source] image::ImageError),
}

/// Decodes any supported format and re-encodes it as an 8-bit RGB PNG.
///
/// Alpha, palette and grayscale inputs are flattened to RGB so every image
/// sent upstream has the same color representation.
pub fn normalize_to_rgb_png(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    let decoded = image::load_from_memory(bytes).map_err(CodecError::Decode)?;
    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());
    encode_png(&rgb)
}

/// Returns PNG bytes for a generated image.
///
/// PNG payloads are verified and returned untouched; anything else is
/// decoded and re-encoded.
pub fn ensure_png(bytes: Vec<u8>) -> Result<Vec<u8>, CodecError> {
    let decoded = image::load_from_memory(&bytes).map_err(CodecError::Decode)?;
    if matches!(image::guess_format(&bytes), Ok(ImageFormat::Png)) {
        return Ok(bytes);
    }
    encode_png(&decoded)
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(CodecError::Encode)?;
    Ok(buf)
}
