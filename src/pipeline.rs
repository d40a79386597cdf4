//! The per-image processing pipeline.
//!
//! ```text
//! source ─► tile ─► kernel scale ─► crop ─► cull ─► relayer ─► result
//! ```
//!
//! Whether to cull is decided once, from the untiled source: images that are
//! translucent on purpose (glass, water) keep their alpha.
//!
//! [`Processor::process`] holds no state between calls, so an interactive
//! caller can re-run the same image with different [`ProcessSettings`].

use std::sync::Arc;

use thiserror::Error;

use crate::buffer::{BufferError, PixelBuffer};
use crate::kernel::{KernelAdapter, KernelError, ScaleFactor};
use crate::postprocess::{contains_translucent, crop, cull_translucent, relayer, CULL_THRESHOLD};
use crate::settings::ProcessSettings;
use crate::tile::{tile, tile_distance};

/// Largest width or height accepted by default.
pub const DEFAULT_MAX_DIMENSION: u32 = 2048;

/// Errors that stop one image from being processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    /// Image exceeds the configured size ceiling
    #[error("image is {width}x{height}, larger than the {limit}px limit")]
    DimensionTooLarge { width: u32, height: u32, limit: u32 },
    /// Upscaling call failed
    #[error(transparent)]
    Kernel(#[from] KernelError),
    /// Buffer construction or stacking failed
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Applies the pipeline with one kernel and one scale factor.
#[derive(Debug, Clone)]
pub struct Processor {
    kernel: Arc<KernelAdapter>,
    factor: ScaleFactor,
    max_dimension: u32,
    cull_threshold: u8,
}

impl Processor {
    pub fn new(kernel: Arc<KernelAdapter>, factor: ScaleFactor) -> Self {
        Self { kernel, factor, max_dimension: DEFAULT_MAX_DIMENSION, cull_threshold: CULL_THRESHOLD }
    }

    /// Set the largest accepted width or height.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    /// Set the alpha threshold used when culling.
    pub fn with_cull_threshold(mut self, threshold: u8) -> Self {
        self.cull_threshold = threshold.max(1);
        self
    }

    pub fn factor(&self) -> ScaleFactor {
        self.factor
    }

    pub fn kernel(&self) -> &Arc<KernelAdapter> {
        &self.kernel
    }

    /// Run the full pipeline on `source`.
    ///
    /// With `settings.skip` the source is returned unchanged.
    pub fn process(
        &self,
        source: &PixelBuffer,
        settings: &ProcessSettings,
    ) -> Result<PixelBuffer, ProcessError> {
        if settings.skip || source.is_empty() {
            return Ok(source.clone());
        }

        let (width, height) = source.dimensions();
        if width > self.max_dimension || height > self.max_dimension {
            return Err(ProcessError::DimensionTooLarge { width, height, limit: self.max_dimension });
        }

        let factor = self.factor.get();
        let should_cull = settings.cull_translucent && !contains_translucent(source);
        let distance = tile_distance(factor, width, height);

        let tiled = tile(source, &settings.tile, distance)?;
        let scaled = self.kernel.scale(&tiled, self.factor)?;
        let mut result = crop(&scaled, distance * factor)?;

        if should_cull {
            cull_translucent(&mut result, self.cull_threshold);
        }
        if settings.relayer {
            relayer(&mut result, source, self.factor);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::KernelKind;
    use crate::settings::{EdgeMode, TileSettings};

    fn processor(factor: u32) -> Processor {
        Processor::new(
            Arc::new(KernelAdapter::from_kind(KernelKind::Nearest)),
            ScaleFactor::new(factor).unwrap(),
        )
    }

    fn checker(size: u32) -> PixelBuffer {
        let mut b = PixelBuffer::new(size, size);
        for y in 0..size {
            for x in 0..size {
                let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                b.set(x, y, [v, v, v, 255]);
            }
        }
        b
    }

    #[test]
    fn test_output_dimensions() {
        let p = processor(3);
        let out = p.process(&checker(5), &ProcessSettings::default()).unwrap();
        assert_eq!(out.dimensions(), (15, 15));
    }

    #[test]
    fn test_nearest_kernel_matches_plain_enlargement() {
        let p = processor(2);
        let src = checker(4);
        let settings = ProcessSettings { tile: TileSettings::uniform(EdgeMode::Wrap), ..Default::default() };
        let out = p.process(&src, &settings).unwrap();
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(out.get(x, y), src.get(x / 2, y / 2));
            }
        }
    }

    #[test]
    fn test_skip_returns_source() {
        let p = processor(4);
        let src = checker(3);
        let settings = ProcessSettings { skip: true, ..Default::default() };
        assert_eq!(p.process(&src, &settings).unwrap(), src);
    }

    #[test]
    fn test_too_large() {
        let p = processor(2).with_max_dimension(8);
        let err = p.process(&PixelBuffer::new(9, 2), &ProcessSettings::default()).unwrap_err();
        assert_eq!(err, ProcessError::DimensionTooLarge { width: 9, height: 2, limit: 8 });
    }

    #[test]
    fn test_translucent_source_is_not_culled() {
        let p = processor(2);
        let src = PixelBuffer::filled(2, 2, [10, 20, 30, 100]);
        let out = p.process(&src, &ProcessSettings::default()).unwrap();
        assert!(out.alphas().all(|a| a == 100));
    }

    #[test]
    fn test_opaque_source_is_culled() {
        let p = processor(2);
        let src = checker(2);
        let out = p.process(&src, &ProcessSettings::default()).unwrap();
        assert!(!contains_translucent(&out));
    }

    #[test]
    fn test_process_is_repeatable() {
        let p = processor(2);
        let src = checker(3);
        let wrap = ProcessSettings { tile: TileSettings::uniform(EdgeMode::Wrap), ..Default::default() };
        let first = p.process(&src, &wrap).unwrap();
        let _ = p.process(&src, &ProcessSettings { relayer: true, ..Default::default() }).unwrap();
        assert_eq!(p.process(&src, &wrap).unwrap(), first);
    }

    #[test]
    fn test_empty_image_passes_through() {
        let p = processor(2);
        let src = PixelBuffer::new(0, 0);
        assert_eq!(p.process(&src, &ProcessSettings::default()).unwrap(), src);
    }
}
