//! Nearest-neighbor kernel.

use super::{check_buffers, KernelError, UpscaleKernel};

/// Replicates every source pixel into a `factor x factor` block.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestKernel;

impl UpscaleKernel for NearestKernel {
    fn name(&self) -> &str {
        "nearest"
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
        nearest(factor as usize, src, dst, width as usize, height as usize);
        Ok(())
    }
}

pub(crate) fn nearest(factor: usize, src: &[u32], dst: &mut [u32], width: usize, height: usize) {
    let out_width = width * factor;
    for y in 0..height * factor {
        let src_row = &src[(y / factor) * width..(y / factor + 1) * width];
        let dst_row = &mut dst[y * out_width..(y + 1) * out_width];
        for (x, px) in dst_row.iter_mut().enumerate() {
            *px = src_row[x / factor];
        }
    }
}
