//! Post-processing applied to the scaled image.
//!
//! - [`crop`] removes the tiling border again
//! - [`contains_translucent`] / [`cull_translucent`] restore hard alpha edges
//! - [`relayer`] puts the original silhouette back under transparent gaps

use crate::buffer::{BufferError, PixelBuffer, CHANNELS};
use crate::kernel::ScaleFactor;

/// Alpha at or above this becomes 255 when culling; below becomes 0.
pub const CULL_THRESHOLD: u8 = 191;

/// Strip `border` pixels from every edge.
pub fn crop(buffer: &PixelBuffer, border: u32) -> Result<PixelBuffer, BufferError> {
    let (width, height) = buffer.dimensions();
    if border == 0 {
        return Ok(buffer.clone());
    }
    if border.saturating_mul(2) >= width || border.saturating_mul(2) >= height {
        return Err(BufferError::CropTooLarge { width, height, border });
    }

    let out_width = (width - 2 * border) as usize;
    let out_height = (height - 2 * border) as usize;
    let row_bytes = width as usize * CHANNELS;
    let start = border as usize * CHANNELS;
    let end = start + out_width * CHANNELS;

    let pixels: Vec<u8> = buffer
        .as_bytes()
        .chunks_exact(row_bytes)
        .skip(border as usize)
        .take(out_height)
        .flat_map(|row| row[start..end].iter().copied())
        .collect();

    PixelBuffer::from_raw(out_width as u32, out_height as u32, pixels)
}

/// True if any pixel is partially transparent (`0 < alpha < 255`).
pub fn contains_translucent(buffer: &PixelBuffer) -> bool {
    buffer.alphas().any(|a| a > 0 && a < 255)
}

/// Snap every alpha to 0 or 255 in place.
///
/// `alpha < threshold` becomes 0, anything else 255. Idempotent for any
/// threshold in `1..=255`.
pub fn cull_translucent(buffer: &mut PixelBuffer, threshold: u8) {
    for px in buffer.as_bytes_mut().chunks_exact_mut(CHANNELS) {
        px[3] = if px[3] < threshold { 0 } else { 255 };
    }
}

/// Fill fully transparent pixels of `result` from `original` in place.
///
/// `original` is read nearest-neighbor at `factor` times its size; only
/// non-transparent source pixels are copied.
pub fn relayer(result: &mut PixelBuffer, original: &PixelBuffer, factor: ScaleFactor) {
    let factor = factor.get();
    let (width, height) = result.dimensions();
    for y in 0..height {
        let src_y = y / factor;
        for x in 0..width {
            if result.get(x, y)[3] != 0 {
                continue;
            }
            match original.checked_get(x / factor, src_y) {
                Some(src) if src[3] != 0 => result.set(x, y, src),
                _ => {}
            }
        }
    }
}
