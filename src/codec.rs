//! PNG decoding and encoding.
//!
//! Encoding goes through the `image` PNG encoder first and falls back to the
//! `png` crate directly if that fails. The optional optimization pass runs
//! `oxipng` (lossless palette, bit-depth and alpha reduction) and keeps
//! whichever output is smaller.

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder, ImageFormat};
use thiserror::Error;

use crate::buffer::PixelBuffer;

/// PNG codec failures.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Input bytes are not a readable PNG
    #[error("failed to decode PNG: {0}")]
    Decode(#[source] image::ImageError),
    /// Every encoder failed
    #[error("failed to encode PNG: {primary}; fallback encoder: {fallback}")]
    Encode { primary: String, fallback: String },
}

/// Decode PNG bytes into an RGBA buffer.
pub fn decode_png(bytes: &[u8]) -> Result<PixelBuffer, CodecError> {
    let image =
        image::load_from_memory_with_format(bytes, ImageFormat::Png).map_err(CodecError::Decode)?;
    Ok(PixelBuffer::from(image.to_rgba8()))
}

fn encode_with(
    buffer: &PixelBuffer,
    compression: CompressionType,
    filter: FilterType,
) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, compression, filter).write_image(
        buffer.as_bytes(),
        buffer.width(),
        buffer.height(),
        ColorType::Rgba8,
    )?;
    Ok(out)
}

/// Encode with the `png` crate directly.
pub fn encode_png_fallback(buffer: &PixelBuffer) -> Result<Vec<u8>, png::EncodingError> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, buffer.width(), buffer.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(buffer.as_bytes())?;
        writer.finish()?;
    }
    Ok(out)
}

/// Encode an RGBA buffer as PNG, trying the fallback encoder on failure.
pub fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>, CodecError> {
    match encode_with(buffer, CompressionType::Default, FilterType::Adaptive) {
        Ok(bytes) => Ok(bytes),
        Err(primary) => {
            log::debug!("primary PNG encoder failed ({}), trying fallback", primary);
            encode_png_fallback(buffer).map_err(|fallback| CodecError::Encode {
                primary: primary.to_string(),
                fallback: fallback.to_string(),
            })
        }
    }
}

/// Losslessly shrink an encoded PNG with `oxipng`.
///
/// Fully transparent pixels may have their color channels rewritten.
/// Returns whichever of `encoded` and the optimized file is smaller; a failed
/// optimization keeps `encoded`.
pub fn optimize_png(encoded: Vec<u8>) -> Vec<u8> {
    let options = oxipng::Options { optimize_alpha: true, ..oxipng::Options::default() };
    match oxipng::optimize_from_memory(&encoded, &options) {
        Ok(optimized) if optimized.len() < encoded.len() => optimized,
        Ok(_) => encoded,
        Err(e) => {
            log::debug!("optimization pass skipped: {}", e);
            encoded
        }
    }
}

/// Encode for output, optionally running the optimization pass.
pub fn encode_output(buffer: &PixelBuffer, optimize: bool) -> Result<Vec<u8>, CodecError> {
    let encoded = encode_png(buffer)?;
    Ok(if optimize { optimize_png(encoded) } else { encoded })
}
