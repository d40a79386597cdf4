//! RGBA pixel buffers and the row/column matrix view used by tiling.
//!
//! [`PixelBuffer`] is the flat, row-major representation that every pipeline
//! stage consumes and produces. [`PixelMatrix`] groups the same data into
//! rows of [`Pixel`]s so that slicing, stacking and reversal can be written
//! as sequence operations instead of index arithmetic.

use image::RgbaImage;
use std::ops::Range;
use thiserror::Error;

/// Bytes per pixel (R, G, B, A).
pub const CHANNELS: usize = 4;

/// One RGBA pixel.
pub type Pixel = [u8; 4];

/// Fully transparent black.
pub const TRANSPARENT: Pixel = [0, 0, 0, 0];

/// Errors raised while constructing or combining buffers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// Byte length does not match `width * height * 4`
    #[error("buffer of {actual} bytes does not match {width}x{height} RGBA ({expected} bytes)")]
    DimensionMismatch { width: u32, height: u32, expected: usize, actual: usize },
    /// Matrices with different widths were stacked vertically
    #[error("cannot stack vertically: widths {0} and {1} differ")]
    WidthMismatch(usize, usize),
    /// Matrices with different heights were stacked horizontally
    #[error("cannot stack horizontally: heights {0} and {1} differ")]
    HeightMismatch(usize, usize),
    /// Rows of a matrix have different lengths
    #[error("ragged matrix: row {row} has {len} pixels, expected {expected}")]
    RaggedRows { row: usize, len: usize, expected: usize },
    /// Tile border is wider than the image it would be copied from
    #[error("cannot tile {distance}px around a {width}x{height} image")]
    TileTooWide { width: u32, height: u32, distance: u32 },
    /// Crop border leaves nothing of the image
    #[error("cannot crop {border}px from each edge of a {width}x{height} image")]
    CropTooLarge { width: u32, height: u32, border: u32 },
}

/// A flat RGBA8 image, row-major, 4 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

fn byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * CHANNELS
}

impl PixelBuffer {
    /// Create a zero-filled (fully transparent) buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, pixels: vec![0; byte_len(width, height)] }
    }

    /// Wrap existing RGBA bytes.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, BufferError> {
        let expected = byte_len(width, height);
        if pixels.len() != expected {
            return Err(BufferError::DimensionMismatch {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self { width, height, pixels })
    }

    /// Create a buffer filled with a single color.
    pub fn filled(width: u32, height: u32, pixel: Pixel) -> Self {
        let pixels = pixel.iter().copied().cycle().take(byte_len(width, height)).collect();
        Self { width, height, pixels }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// True when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Raw RGBA bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable raw RGBA bytes. The length cannot change through this slice.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.pixels
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.width && y < self.height {
            Some((y as usize * self.width as usize + x as usize) * CHANNELS)
        } else {
            None
        }
    }

    /// Read a pixel, or `None` if `(x, y)` is outside the buffer.
    pub fn checked_get(&self, x: u32, y: u32) -> Option<Pixel> {
        let i = self.offset(x, y)?;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]])
    }

    /// Read a pixel.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds. Callers derive coordinates from
    /// the buffer's own dimensions, so this indicates a bug.
    pub fn get(&self, x: u32, y: u32) -> Pixel {
        match self.checked_get(x, y) {
            Some(p) => p,
            None => panic!(
                "pixel ({}, {}) out of bounds for {}x{} buffer",
                x, y, self.width, self.height
            ),
        }
    }

    /// Write a pixel.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn set(&mut self, x: u32, y: u32, pixel: Pixel) {
        match self.offset(x, y) {
            Some(i) => self.pixels[i..i + CHANNELS].copy_from_slice(&pixel),
            None => panic!(
                "pixel ({}, {}) out of bounds for {}x{} buffer",
                x, y, self.width, self.height
            ),
        }
    }

    /// Iterate over the alpha channel.
    pub fn alphas(&self) -> impl Iterator<Item = u8> + '_ {
        self.pixels.chunks_exact(CHANNELS).map(|p| p[3])
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height, pixels: image.into_raw() }
    }
}

impl From<PixelBuffer> for RgbaImage {
    fn from(buffer: PixelBuffer) -> Self {
        let (width, height) = buffer.dimensions();
        // Length invariant is upheld by every PixelBuffer constructor.
        RgbaImage::from_raw(width, height, buffer.pixels)
            .unwrap_or_else(|| RgbaImage::new(width, height))
    }
}

/// A buffer viewed as rows of pixels.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PixelMatrix {
    rows: Vec<Vec<Pixel>>,
}

impl PixelMatrix {
    /// Build a matrix from rows, checking every row has the same length.
    pub fn from_rows(rows: Vec<Vec<Pixel>>) -> Result<Self, BufferError> {
        if let Some(first) = rows.first() {
            let expected = first.len();
            for (row, r) in rows.iter().enumerate() {
                if r.len() != expected {
                    return Err(BufferError::RaggedRows { row, len: r.len(), expected });
                }
            }
        }
        Ok(Self { rows })
    }

    /// Split a flat buffer into rows.
    pub fn from_buffer(buffer: &PixelBuffer) -> Self {
        let row_bytes = buffer.width() as usize * CHANNELS;
        if row_bytes == 0 {
            return Self { rows: vec![Vec::new(); buffer.height() as usize] };
        }
        let rows = buffer
            .as_bytes()
            .chunks_exact(row_bytes)
            .map(|row| row.chunks_exact(CHANNELS).map(|p| [p[0], p[1], p[2], p[3]]).collect())
            .collect();
        Self { rows }
    }

    /// A `width` x `height` matrix of one pixel value.
    pub fn filled(width: usize, height: usize, pixel: Pixel) -> Self {
        Self { rows: vec![vec![pixel; width]; height] }
    }

    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<Pixel>] {
        &self.rows
    }

    /// Rows in `range`.
    pub fn v_slice(&self, range: Range<usize>) -> Self {
        Self { rows: self.rows[range].to_vec() }
    }

    /// Columns in `range`, for every row.
    pub fn h_slice(&self, range: Range<usize>) -> Self {
        Self { rows: self.rows.iter().map(|row| row[range.clone()].to_vec()).collect() }
    }

    /// Stack matrices top to bottom. Empty (zero-row) parts are ignored.
    pub fn v_stack(parts: &[&PixelMatrix]) -> Result<Self, BufferError> {
        let mut rows = Vec::new();
        let mut width = None;
        for part in parts.iter().filter(|p| p.height() > 0) {
            match width {
                None => width = Some(part.width()),
                Some(w) if w != part.width() => {
                    return Err(BufferError::WidthMismatch(w, part.width()));
                }
                Some(_) => {}
            }
            rows.extend(part.rows.iter().cloned());
        }
        Ok(Self { rows })
    }

    /// Stack matrices left to right.
    pub fn h_stack(parts: &[&PixelMatrix]) -> Result<Self, BufferError> {
        let Some(first) = parts.first() else {
            return Ok(Self::default());
        };
        let height = first.height();
        if let Some(bad) = parts.iter().find(|p| p.height() != height) {
            return Err(BufferError::HeightMismatch(height, bad.height()));
        }
        let rows = (0..height)
            .map(|r| parts.iter().flat_map(|p| p.rows[r].iter().copied()).collect())
            .collect();
        Ok(Self { rows })
    }

    /// Reverse the order of rows (vertical flip).
    pub fn reverse_rows(mut self) -> Self {
        self.rows.reverse();
        self
    }

    /// Reverse the pixels within every row (horizontal flip).
    pub fn reverse_columns(mut self) -> Self {
        for row in &mut self.rows {
            row.reverse();
        }
        self
    }

    /// Repeat the whole matrix `times` times vertically.
    pub fn repeat_rows(&self, times: usize) -> Self {
        Self { rows: (0..times).flat_map(|_| self.rows.iter().cloned()).collect() }
    }

    /// Repeat every row's pixels `times` times horizontally.
    pub fn repeat_columns(&self, times: usize) -> Self {
        Self { rows: self.rows.iter().map(|row| row.repeat(times)).collect() }
    }

    /// Flatten back into a [`PixelBuffer`].
    pub fn into_buffer(self) -> PixelBuffer {
        let width = self.width() as u32;
        let height = self.height() as u32;
        let pixels: Vec<u8> = self.rows.into_iter().flatten().flatten().collect();
        PixelBuffer { width, height, pixels }
    }
}
