//! Scale2x / Scale3x (AdvMAME) edge-aware kernel.
//!
//! Each source pixel `E` is expanded using its 3x3 neighborhood:
//!
//! ```text
//!   A B C
//!   D E F
//!   G H I
//! ```
//!
//! Scale2x only reads the plus-shaped neighbors (`B`, `D`, `F`, `H`);
//! Scale3x also reads the diagonals. Larger factors are composed:
//!
//! | Factor | Passes |
//! |--------|--------|
//! | 2 | Scale2x |
//! | 3 | Scale3x |
//! | 4 | Scale2x, Scale2x |
//! | 5 | nearest-neighbor (no rule set divides 5) |
//! | 6 | Scale3x, Scale2x |
//!
//! Neighbors outside the image are clamped to the edge, which is why the
//! pipeline tiles a real border around the image before calling in.

use super::nearest::nearest;
use super::{check_buffers, KernelError, UpscaleKernel};

/// Scale2x/Scale3x family kernel. Stateless and reentrant.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScaleNxKernel;

impl UpscaleKernel for ScaleNxKernel {
    fn name(&self) -> &str {
        "scalenx"
    }

    fn scale(
        &self,
        factor: u32,
        src: &[u32],
        dst: &mut [u32],
        width: u32,
        height: u32,
    ) -> Result<(), KernelError> {
        check_buffers(factor, src, dst, width, height)?;
        let (w, h) = (width as usize, height as usize);

        let scaled = match factor {
            2 => scale2x(src, w, h),
            3 => scale3x(src, w, h),
            4 => scale2x(&scale2x(src, w, h), w * 2, h * 2),
            6 => scale2x(&scale3x(src, w, h), w * 3, h * 3),
            5 => {
                nearest(5, src, dst, w, h);
                return Ok(());
            }
            other => return Err(KernelError::InvalidFactor(other)),
        };
        dst.copy_from_slice(&scaled);
        Ok(())
    }
}

/// Neighborhood accessor with edge clamping.
struct Grid<'a> {
    pixels: &'a [u32],
    width: usize,
    height: usize,
}

impl Grid<'_> {
    fn at(&self, x: isize, y: isize) -> u32 {
        let cx = x.clamp(0, self.width as isize - 1) as usize;
        let cy = y.clamp(0, self.height as isize - 1) as usize;
        self.pixels[cy * self.width + cx]
    }

    /// `[A, B, C, D, E, F, G, H, I]` around `(x, y)`.
    fn neighborhood(&self, x: usize, y: usize) -> [u32; 9] {
        let (x, y) = (x as isize, y as isize);
        [
            self.at(x - 1, y - 1),
            self.at(x, y - 1),
            self.at(x + 1, y - 1),
            self.at(x - 1, y),
            self.at(x, y),
            self.at(x + 1, y),
            self.at(x - 1, y + 1),
            self.at(x, y + 1),
            self.at(x + 1, y + 1),
        ]
    }
}

fn scale2x(src: &[u32], width: usize, height: usize) -> Vec<u32> {
    let grid = Grid { pixels: src, width, height };
    let out_width = width * 2;
    let mut out = vec![0; out_width * height * 2];

    for y in 0..height {
        for x in 0..width {
            let [_, b, _, d, e, f, _, h, _] = grid.neighborhood(x, y);

            let block = if b != h && d != f {
                [
                    if d == b { d } else { e },
                    if b == f { f } else { e },
                    if d == h { d } else { e },
                    if h == f { f } else { e },
                ]
            } else {
                [e; 4]
            };

            let (ox, oy) = (x * 2, y * 2);
            out[oy * out_width + ox] = block[0];
            out[oy * out_width + ox + 1] = block[1];
            out[(oy + 1) * out_width + ox] = block[2];
            out[(oy + 1) * out_width + ox + 1] = block[3];
        }
    }

    out
}

fn scale3x(src: &[u32], width: usize, height: usize) -> Vec<u32> {
    let grid = Grid { pixels: src, width, height };
    let out_width = width * 3;
    let mut out = vec![0; out_width * height * 3];

    for y in 0..height {
        for x in 0..width {
            let [a, b, c, d, e, f, g, h, i] = grid.neighborhood(x, y);

            let block = if b != h && d != f {
                [
                    if d == b { d } else { e },
                    if (d == b && e != c) || (b == f && e != a) { b } else { e },
                    if b == f { f } else { e },
                    if (d == b && e != g) || (d == h && e != a) { d } else { e },
                    e,
                    if (b == f && e != i) || (h == f && e != c) { f } else { e },
                    if d == h { d } else { e },
                    if (d == h && e != i) || (h == f && e != g) { h } else { e },
                    if h == f { f } else { e },
                ]
            } else {
                [e; 9]
            };

            let (ox, oy) = (x * 3, y * 3);
            for (n, px) in block.into_iter().enumerate() {
                out[(oy + n / 3) * out_width + ox + n % 3] = px;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u32 = 0xFFFF_FFFF;
    const K: u32 = 0xFF00_0000;

    fn run(factor: u32, src: &[u32], width: u32, height: u32) -> Vec<u32> {
        let mut dst = vec![0; src.len() * (factor * factor) as usize];
        ScaleNxKernel.scale(factor, src, &mut dst, width, height).unwrap();
        dst
    }

    #[test]
    fn test_solid_image_stays_solid() {
        for factor in 2..=6 {
            let out = run(factor, &[K; 9], 3, 3);
            assert_eq!(out.len(), 9 * (factor * factor) as usize);
            assert!(out.iter().all(|&p| p == K), "factor {}", factor);
        }
    }

    #[test]
    fn test_scale2x_rounds_diagonal() {
        // Diagonal edge:
        //   K W
        //   W W
        let out = run(2, &[K, W, W, W], 2, 2);
        // The black pixel's bottom-right sub-pixel picks up white from the
        // matching right and bottom neighbors.
        assert_eq!(out[0], K);
        assert_eq!(out[5], W);
    }

    #[test]
    fn test_scale2x_preserves_straight_edge() {
        // Vertical edge: left column black, right column white.
        let src = [K, W, K, W, K, W];
        let out = run(2, &src, 2, 3);
        for row in out.chunks(4) {
            assert_eq!(row, &[K, K, W, W]);
        }
    }

    #[test]
    fn test_scale3x_center_is_source() {
        let src = [K, W, K, W, K, W, K, W, K];
        let out = run(3, &src, 3, 3);
        // Center of the center block (4, 4) is always E.
        assert_eq!(out[4 * 9 + 4], K);
    }

    #[test]
    fn test_factor_five_is_nearest() {
        let out = run(5, &[K, W], 2, 1);
        assert_eq!(&out[0..10], &[K, K, K, K, K, W, W, W, W, W]);
    }

    #[test]
    fn test_invalid_factor() {
        let mut dst = vec![0; 49];
        assert!(ScaleNxKernel.scale(7, &[K], &mut dst, 1, 1).is_err());
    }
}
