//! Edge tiling applied before upscaling.
//!
//! Pixel-pattern upscalers look at a neighborhood around each source pixel.
//! At the image border that neighborhood does not exist, which leaves seams
//! on textures that are meant to repeat. [`tile`] synthesizes a border of
//! [`tile_distance`] pixels on every side so the kernel sees plausible
//! neighbors; the border is cropped away again after scaling.
//!
//! # Assembly order
//!
//! ```text
//!   1. N, S strips from the source       2. E, W strips from step 1
//!
//!          [ N ]                          [ W | N | E ]
//!          [ src ]                        [ W |src| E ]
//!          [ S ]                          [ W | S | E ]
//! ```
//!
//! Corners are therefore an east/west tiling of the north/south-tiled
//! image, not tiled independently.

use crate::buffer::{BufferError, PixelBuffer, PixelMatrix, TRANSPARENT};
use crate::settings::{Direction, EdgeMode, TileSettings};

/// Width of the synthesized border.
///
/// Never wider than the image, and no wider than the kernel's reach.
pub fn tile_distance(factor: u32, width: u32, height: u32) -> u32 {
    factor.min(width).min(height)
}

/// Surround `source` with border strips `distance` pixels wide.
///
/// The result is `(width + 2 * distance) x (height + 2 * distance)`.
/// Fails with [`BufferError::TileTooWide`] if `distance` exceeds either
/// dimension; [`tile_distance`] always yields a valid distance.
pub fn tile(
    source: &PixelBuffer,
    settings: &TileSettings,
    distance: u32,
) -> Result<PixelBuffer, BufferError> {
    let (width, height) = source.dimensions();
    if distance > width.min(height) {
        return Err(BufferError::TileTooWide { width, height, distance });
    }
    let strip =
        |m: &PixelMatrix, d: Direction| edge_strip(m, settings.get(d), d, distance as usize);
    let matrix = PixelMatrix::from_buffer(source);

    let north = strip(&matrix, Direction::North);
    let south = strip(&matrix, Direction::South);
    let middle = PixelMatrix::v_stack(&[&north, &matrix, &south])?;

    let east = strip(&middle, Direction::East);
    let west = strip(&middle, Direction::West);
    let tiled = PixelMatrix::h_stack(&[&west, &middle, &east])?;

    Ok(tiled.into_buffer())
}

/// Build the border strip for one edge.
///
/// # Panics
///
/// Panics if `distance` exceeds the matrix width or height.
pub fn edge_strip(
    matrix: &PixelMatrix,
    mode: EdgeMode,
    direction: Direction,
    distance: usize,
) -> PixelMatrix {
    match mode {
        EdgeMode::Void => void_strip(matrix, direction, distance),
        EdgeMode::Wrap => wrap_strip(matrix, direction, distance),
        EdgeMode::Extend => extend_strip(matrix, direction, distance),
        EdgeMode::Mirror => mirror_strip(matrix, direction, distance),
    }
}

fn void_strip(matrix: &PixelMatrix, direction: Direction, distance: usize) -> PixelMatrix {
    if direction.is_vertical() {
        PixelMatrix::filled(matrix.width(), distance, TRANSPARENT)
    } else {
        PixelMatrix::filled(distance, matrix.height(), TRANSPARENT)
    }
}

/// What lies beyond `direction` if the image repeats: the far edge.
fn wrap_strip(matrix: &PixelMatrix, direction: Direction, distance: usize) -> PixelMatrix {
    let (width, height) = (matrix.width(), matrix.height());
    match direction {
        Direction::North => matrix.v_slice(height - distance..height),
        Direction::South => matrix.v_slice(0..distance),
        Direction::East => matrix.h_slice(0..distance),
        Direction::West => matrix.h_slice(width - distance..width),
    }
}

/// The one-pixel wrap strip of the opposite direction, repeated.
fn extend_strip(matrix: &PixelMatrix, direction: Direction, distance: usize) -> PixelMatrix {
    let edge = wrap_strip(matrix, direction.opposite(), distance.min(1));
    if direction.is_vertical() {
        edge.repeat_rows(distance)
    } else {
        edge.repeat_columns(distance)
    }
}

/// The wrap strip of the opposite direction, flipped across the edge.
fn mirror_strip(matrix: &PixelMatrix, direction: Direction, distance: usize) -> PixelMatrix {
    let near = wrap_strip(matrix, direction.opposite(), distance);
    if direction.is_vertical() {
        near.reverse_rows()
    } else {
        near.reverse_columns()
    }
}
