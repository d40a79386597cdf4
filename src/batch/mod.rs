//! Concurrent bulk upscaling.
//!
//! A batch takes a list of encoded inputs and runs every one through
//! decode, classify, [`Processor::process`](crate::pipeline::Processor::process)
//! and encode on a bounded pool of worker threads.
//!
//! # How It Works
//!
//! 1. The kernel is initialized once, before any worker starts
//! 2. `W` scoped workers each claim the next unclaimed input from a shared
//!    atomic cursor, so slow images never hold up a fixed share of the work
//! 3. Each finished item is recorded together with its input index and a
//!    progress event is emitted
//! 4. Results are sorted back into input order
//!
//! Per-item failures never abort the batch: they become [`ItemResult`]s
//! carrying the original bytes (or no data, if the input was unreadable).
//!
//! ```ignore
//! use texscale::batch::{BatchRunner, SourceImage};
//!
//! let result = BatchRunner::new(processor).with_jobs(4).run(&inputs)?;
//! println!("{}", result.summary());
//! ```

pub mod progress;
pub mod result;
pub mod runner;

pub use progress::{
    CallbackProgress, ConsoleProgress, JsonProgress, NullProgress, ProgressEvent, ProgressReporter,
};
pub use result::{BatchResult, BatchState, ItemOutcome, ItemResult};
pub use runner::{BatchRunner, CancelToken, ItemError};

use thiserror::Error;

use crate::buffer::PixelBuffer;
use crate::codec::{decode_png, CodecError};
use crate::kernel::KernelError;
use crate::settings::ProcessSettings;

/// One encoded input image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    /// Asset path, used for classification and to key the result
    pub name: String,
    /// PNG bytes
    pub bytes: Vec<u8>,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }
}

/// A decoded input owned by the worker processing it.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub name: String,
    pub source: PixelBuffer,
    pub settings: ProcessSettings,
}

impl WorkItem {
    /// Decode `input` and attach its settings.
    pub fn decode(input: &SourceImage, settings: ProcessSettings) -> Result<Self, CodecError> {
        Ok(Self { name: input.name.clone(), source: decode_png(&input.bytes)?, settings })
    }
}

/// Errors that stop a whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// The kernel could not be initialized; no item was started
    #[error("cannot start batch: {0}")]
    KernelInit(#[source] KernelError),
    /// `run` was called on a batch that already ran
    #[error("batch is {0}, not idle")]
    NotIdle(BatchState),
}
