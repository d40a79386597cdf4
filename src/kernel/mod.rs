//! Upscaling kernel adapter.
//!
//! The kernel is the pixel-pattern magnifier that does the actual scaling.
//! It is consumed through [`UpscaleKernel`], a C-style contract over packed
//! ARGB pixels (alpha in the high byte, row-major) with a caller-allocated
//! output, so that native or foreign implementations can be plugged in.
//!
//! [`KernelAdapter`] owns one kernel for the whole process:
//! - initializes it exactly once ([`KernelAdapter::ensure_initialized`]),
//! - marshals [`PixelBuffer`]s to and from the ARGB layout,
//! - serializes calls through a single lock when the kernel is not reentrant.
//!
//! # Built-in kernels
//!
//! | Kernel | Factors | Notes |
//! |--------|---------|-------|
//! | [`ScaleNxKernel`] | 2-6 | Scale2x/Scale3x rule sets, composed for 4x and 6x |
//! | [`NearestKernel`] | 2-6 | Pixel replication |

pub mod nearest;
pub mod scalenx;

pub use nearest::NearestKernel;
pub use scalenx::ScaleNxKernel;

use crate::buffer::{PixelBuffer, CHANNELS};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, OnceLock};
use thiserror::Error;

/// Errors raised by a kernel or the adapter around it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    /// Scale factor outside 2..=6
    #[error("unsupported scale factor {0} (expected 2-6)")]
    InvalidFactor(u32),
    /// One-time initialization failed
    #[error("kernel initialization failed: {0}")]
    Init(String),
    /// The kernel rejected or failed a scaling call
    #[error("kernel '{kernel}' failed: {message}")]
    Failed { kernel: String, message: String },
    /// Input or output slice does not match the requested dimensions
    #[error("kernel buffer size mismatch: expected {expected} pixels, got {actual}")]
    BufferSize { expected: usize, actual: usize },
}

/// Integer upscaling factor in `2..=6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ScaleFactor(u32);

impl ScaleFactor {
    pub const MIN: u32 = 2;
    pub const MAX: u32 = 6;

    pub fn new(factor: u32) -> Result<Self, KernelError> {
        if (Self::MIN..=Self::MAX).contains(&factor) {
            Ok(Self(factor))
        } else {
            Err(KernelError::InvalidFactor(factor))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for ScaleFactor {
    fn default() -> Self {
        Self(4)
    }
}

impl TryFrom<u32> for ScaleFactor {
    type Error = KernelError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ScaleFactor> for u32 {
    fn from(factor: ScaleFactor) -> Self {
        factor.0
    }
}

impl std::fmt::Display for ScaleFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x", self.0)
    }
}

/// A pixel-pattern upscaler operating on packed ARGB.
pub trait UpscaleKernel: Send + Sync {
    /// Short identifier used in diagnostics.
    fn name(&self) -> &str;

    /// One-time global setup. Called once by [`KernelAdapter`] before any
    /// call to [`scale`](Self::scale).
    fn initialize(&self) -> Result<(), KernelError> {
        Ok(())
    }

    /// Whether concurrent calls to [`scale`](Self::scale) are safe.
    fn is_reentrant(&self) -> bool {
        true
    }

    /// Scale `src` (`width * height` ARGB pixels) into `dst`
    /// (`width * factor * height * factor` pixels).
    fn scale(
        &self,
        factor: u32,
        src: &[u32],
        dst: &mut [u32],
        width: u32,
        height: u32,
    ) -> Result<(), KernelError>;
}

/// Selectable built-in kernels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum KernelKind {
    /// Edge-aware Scale2x/Scale3x family (default)
    #[default]
    Scalenx,
    /// Nearest-neighbor replication
    Nearest,
}

impl KernelKind {
    pub fn build(self) -> Arc<dyn UpscaleKernel> {
        match self {
            KernelKind::Scalenx => Arc::new(ScaleNxKernel),
            KernelKind::Nearest => Arc::new(NearestKernel),
        }
    }
}

impl std::fmt::Display for KernelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KernelKind::Scalenx => write!(f, "scalenx"),
            KernelKind::Nearest => write!(f, "nearest"),
        }
    }
}

/// Pack RGBA bytes into ARGB words.
pub fn pack_argb(rgba: &[u8]) -> Vec<u32> {
    rgba.chunks_exact(CHANNELS)
        .map(|p| {
            (p[3] as u32) << 24 | (p[0] as u32) << 16 | (p[1] as u32) << 8 | p[2] as u32
        })
        .collect()
}

/// Unpack ARGB words into RGBA bytes.
pub fn unpack_argb(argb: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(argb.len() * CHANNELS);
    for &px in argb {
        out.extend_from_slice(&[(px >> 16) as u8, (px >> 8) as u8, px as u8, (px >> 24) as u8]);
    }
    out
}

/// Process-wide handle to one kernel.
///
/// Cheap to share behind an `Arc`; every worker in a batch calls
/// [`scale`](Self::scale) on the same adapter.
pub struct KernelAdapter {
    kernel: Arc<dyn UpscaleKernel>,
    init: OnceLock<Result<(), KernelError>>,
    invoke_lock: Option<Mutex<()>>,
}

impl std::fmt::Debug for KernelAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelAdapter")
            .field("kernel", &self.kernel.name())
            .field("initialized", &self.init.get().is_some())
            .field("serialized", &self.invoke_lock.is_some())
            .finish()
    }
}

impl KernelAdapter {
    pub fn new(kernel: Arc<dyn UpscaleKernel>) -> Self {
        let invoke_lock = if kernel.is_reentrant() { None } else { Some(Mutex::new(())) };
        Self { kernel, init: OnceLock::new(), invoke_lock }
    }

    pub fn from_kind(kind: KernelKind) -> Self {
        Self::new(kind.build())
    }

    pub fn kernel_name(&self) -> &str {
        self.kernel.name()
    }

    /// Initialize the kernel if it has not been already.
    ///
    /// Concurrent callers block until the first caller's initialization
    /// finishes and all observe the same outcome. A failure is cached.
    pub fn ensure_initialized(&self) -> Result<(), KernelError> {
        self.init
            .get_or_init(|| {
                log::info!("Initializing kernel '{}'", self.kernel.name());
                self.kernel.initialize()
            })
            .clone()
    }

    /// Scale `buffer` by `factor`.
    ///
    /// The result is exactly `(width * factor, height * factor)`.
    pub fn scale(&self, buffer: &PixelBuffer, factor: ScaleFactor) -> Result<PixelBuffer, KernelError> {
        self.ensure_initialized()?;

        let f = factor.get();
        let (width, height) = buffer.dimensions();
        let out_width = width * f;
        let out_height = height * f;

        let src = pack_argb(buffer.as_bytes());
        let mut dst = vec![0u32; out_width as usize * out_height as usize];

        {
            let _guard = self
                .invoke_lock
                .as_ref()
                .map(|lock| lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner()));
            self.kernel.scale(f, &src, &mut dst, width, height)?;
        }

        PixelBuffer::from_raw(out_width, out_height, unpack_argb(&dst)).map_err(|e| {
            KernelError::Failed { kernel: self.kernel.name().to_string(), message: e.to_string() }
        })
    }
}

/// Check slice lengths against the requested dimensions.
///
/// Kernels call this at the top of [`UpscaleKernel::scale`].
pub fn check_buffers(
    factor: u32,
    src: &[u32],
    dst: &[u32],
    width: u32,
    height: u32,
) -> Result<(), KernelError> {
    let expected_src = width as usize * height as usize;
    if src.len() != expected_src {
        return Err(KernelError::BufferSize { expected: expected_src, actual: src.len() });
    }
    let expected_dst = expected_src * (factor as usize * factor as usize);
    if dst.len() != expected_dst {
        return Err(KernelError::BufferSize { expected: expected_dst, actual: dst.len() });
    }
    Ok(())
}
