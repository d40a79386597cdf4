//! Worker pool execution.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use thiserror::Error;

use super::progress::{NullProgress, ProgressEvent, ProgressReporter};
use super::result::{BatchResult, BatchState, ItemResult};
use super::{BatchError, SourceImage, WorkItem};
use crate::codec::{encode_output, CodecError};
use crate::pipeline::{ProcessError, Processor};
use crate::settings::{Classifier, ProcessSettings};

/// Default number of workers (uses available parallelism).
fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Shared flag that stops a running batch between items.
///
/// Items already being processed finish; unclaimed items are reported as
/// cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a single item did not produce upscaled output.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl ItemError {
    /// Whether the original bytes stand in for the output.
    ///
    /// Unreadable inputs have nothing usable to pass through.
    pub fn keeps_original(&self) -> bool {
        !matches!(self, ItemError::Codec(CodecError::Decode(_)))
    }
}

/// Runs one batch of images through a [`Processor`].
///
/// A runner is single-use: it moves from `Idle` through `Running` to a
/// terminal [`BatchState`], and a second [`run`](Self::run) is rejected.
pub struct BatchRunner {
    processor: Processor,
    classifier: Classifier,
    /// Applied to every item instead of classifying its path
    settings_override: Option<ProcessSettings>,
    optimize: bool,
    jobs: usize,
    progress: Arc<dyn ProgressReporter>,
    cancel: CancelToken,
    state: Mutex<BatchState>,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("processor", &self.processor)
            .field("settings_override", &self.settings_override)
            .field("optimize", &self.optimize)
            .field("jobs", &self.jobs)
            .field("state", &self.state())
            .finish()
    }
}

impl BatchRunner {
    pub fn new(processor: Processor) -> Self {
        Self {
            processor,
            classifier: Classifier::default(),
            settings_override: None,
            optimize: false,
            jobs: default_jobs(),
            progress: Arc::new(NullProgress),
            cancel: CancelToken::new(),
            state: Mutex::new(BatchState::Idle),
        }
    }

    /// Set the number of worker threads (at least 1).
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Use `settings` for every item instead of classifying paths.
    pub fn with_settings_override(mut self, settings: Option<ProcessSettings>) -> Self {
        self.settings_override = settings;
        self
    }

    /// Run the oxipng pass on every encoded output.
    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// A handle that cancels this batch.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> BatchState {
        *self.lock_state()
    }

    fn lock_state(&self) -> MutexGuard<'_, BatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Process every input and return results in input order.
    ///
    /// Fails only if the batch already ran or the kernel cannot be
    /// initialized; per-item problems are reported in the result.
    pub fn run(&self, inputs: &[SourceImage]) -> Result<BatchResult, BatchError> {
        {
            let mut state = self.lock_state();
            if *state != BatchState::Idle {
                return Err(BatchError::NotIdle(*state));
            }
            self.processor.kernel().ensure_initialized().map_err(BatchError::KernelInit)?;
            *state = BatchState::Running;
        }

        let start = Instant::now();
        let workers = self.jobs.min(inputs.len()).max(1);
        log::info!(
            "Upscaling {} images at {} with '{}' on {} workers",
            inputs.len(),
            self.processor.factor(),
            self.processor.kernel().kernel_name(),
            workers
        );
        self.report(ProgressEvent::BatchStarted { total: inputs.len(), workers });

        let items = match panic::catch_unwind(AssertUnwindSafe(|| self.execute(inputs, workers))) {
            Ok(items) => items,
            Err(payload) => {
                *self.lock_state() = BatchState::PartiallyFailed;
                panic::resume_unwind(payload);
            }
        };
        let result = BatchResult::new(items, self.cancel.is_cancelled(), start.elapsed());
        *self.lock_state() = result.state;

        log::info!(
            "Batch {}: {} processed, {} unchanged, {} fallback, {} failed in {:?}",
            result.state,
            result.processed_count(),
            result.unchanged_count(),
            result.fallback_count(),
            result.failed_count(),
            result.total_duration
        );
        self.report(ProgressEvent::BatchCompleted {
            state: result.state,
            duration_ms: result.total_duration.as_millis() as u64,
            processed: result.processed_count(),
            unchanged: result.unchanged_count(),
            fallback: result.fallback_count(),
            failed: result.failed_count(),
        });

        Ok(result)
    }

    fn execute(&self, inputs: &[SourceImage], workers: usize) -> Vec<ItemResult> {
        let results = Mutex::new(Vec::with_capacity(inputs.len()));
        let next_idx = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..workers {
                let results = &results;
                let next_idx = &next_idx;

                s.spawn(move || loop {
                    let idx = next_idx.fetch_add(1, Ordering::SeqCst);
                    if idx >= inputs.len() {
                        break;
                    }

                    let input = &inputs[idx];
                    let result = if self.cancel.is_cancelled() {
                        ItemResult::cancelled(input.name.clone())
                    } else {
                        self.run_item(input)
                    };
                    self.record(results, idx, result, inputs.len());
                });
            }
        });

        // Sort results by input index to restore input order
        let mut results = results.into_inner().unwrap_or_else(PoisonError::into_inner);
        results.sort_by_key(|(idx, _)| *idx);
        results.into_iter().map(|(_, r)| r).collect()
    }

    /// Store a finished item and report it while still holding the lock, so
    /// `completed` counts arrive in order.
    ///
    /// The guard lives outside the reporter call, so a panicking reporter
    /// neither poisons the lock nor loses the stored result.
    fn record(
        &self,
        results: &Mutex<Vec<(usize, ItemResult)>>,
        idx: usize,
        result: ItemResult,
        total: usize,
    ) {
        let mut results = results.lock().unwrap_or_else(PoisonError::into_inner);
        let event = ProgressEvent::ItemCompleted {
            name: result.name.clone(),
            outcome: result.outcome.clone(),
            completed: results.len() + 1,
            total,
            duration_ms: result.duration.as_millis() as u64,
        };
        results.push((idx, result));
        self.report(event);
    }

    /// Forward an event to the reporter. A panicking reporter is logged and
    /// otherwise ignored.
    fn report(&self, event: ProgressEvent) {
        let reported = panic::catch_unwind(AssertUnwindSafe(|| self.progress.report(event)));
        if let Err(payload) = reported {
            log::warn!("progress reporter panicked: {}", panic_message(payload.as_ref()));
        }
    }

    fn settings_for(&self, name: &str) -> ProcessSettings {
        self.settings_override.unwrap_or_else(|| self.classifier.classify(name))
    }

    fn run_item(&self, input: &SourceImage) -> ItemResult {
        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process_item(input)));
        let duration = start.elapsed();
        let name = input.name.clone();

        match outcome {
            Ok(Ok(Some(data))) => {
                log::debug!("{}: processed in {:?}", name, duration);
                ItemResult::processed(name, data, duration)
            }
            Ok(Ok(None)) => {
                log::debug!("{}: skipped", name);
                ItemResult::unchanged(name, input.bytes.clone(), duration)
            }
            Ok(Err(err)) => {
                log::warn!("{}: {}", name, err);
                if err.keeps_original() {
                    ItemResult::fallback(name, err.to_string(), input.bytes.clone(), duration)
                } else {
                    ItemResult::failed(name, err.to_string(), duration)
                }
            }
            Err(payload) => {
                let message = format!("worker panicked: {}", panic_message(payload.as_ref()));
                log::warn!("{}: {}", name, message);
                ItemResult::fallback(name, message, input.bytes.clone(), duration)
            }
        }
    }

    /// `Ok(None)` means the item is classified as skip.
    fn process_item(&self, input: &SourceImage) -> Result<Option<Vec<u8>>, ItemError> {
        let settings = self.settings_for(&input.name);
        if settings.skip {
            return Ok(None);
        }

        let item = WorkItem::decode(input, settings)?;
        let scaled = self.processor.process(&item.source, &item.settings)?;
        Ok(Some(encode_output(&scaled, self.optimize)?))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{CallbackProgress, ItemOutcome};
    use crate::buffer::PixelBuffer;
    use crate::codec::{decode_png, encode_png};
    use crate::kernel::{KernelAdapter, KernelError, KernelKind, NearestKernel, ScaleFactor, UpscaleKernel};

    fn processor() -> Processor {
        Processor::new(
            Arc::new(KernelAdapter::from_kind(KernelKind::Nearest)),
            ScaleFactor::new(2).unwrap(),
        )
    }

    fn png(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
        encode_png(&PixelBuffer::filled(width, height, pixel)).unwrap()
    }

    fn inputs(count: usize) -> Vec<SourceImage> {
        (0..count)
            .map(|i| SourceImage::new(format!("item/{}.png", i), png(4, 4, [i as u8, 0, 0, 255])))
            .collect()
    }

    /// Panics on a pure red pixel.
    struct PanickingKernel;

    impl UpscaleKernel for PanickingKernel {
        fn name(&self) -> &str {
            "panicking"
        }

        fn is_reentrant(&self) -> bool {
            false
        }

        fn scale(
            &self,
            factor: u32,
            src: &[u32],
            dst: &mut [u32],
            width: u32,
            height: u32,
        ) -> Result<(), KernelError> {
            if src.contains(&0xFFFF_0000) {
                panic!("red pixel");
            }
            NearestKernel.scale(factor, src, dst, width, height)
        }
    }

    /// Non-reentrant kernel that records how many calls overlap.
    #[derive(Default)]
    struct OverlapCounter {
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl UpscaleKernel for OverlapCounter {
        fn name(&self) -> &str {
            "overlap-counter"
        }

        fn is_reentrant(&self) -> bool {
            false
        }

        fn scale(
            &self,
            factor: u32,
            src: &[u32],
            dst: &mut [u32],
            width: u32,
            height: u32,
        ) -> Result<(), KernelError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(2));
            let scaled = NearestKernel.scale(factor, src, dst, width, height);
            self.active.fetch_sub(1, Ordering::SeqCst);
            scaled
        }
    }

    struct BrokenInitKernel;

    impl UpscaleKernel for BrokenInitKernel {
        fn name(&self) -> &str {
            "broken"
        }

        fn initialize(&self) -> Result<(), KernelError> {
            Err(KernelError::Init("module missing".to_string()))
        }

        fn scale(&self, _: u32, _: &[u32], _: &mut [u32], _: u32, _: u32) -> Result<(), KernelError> {
            Ok(())
        }
    }

    #[test]
    fn test_batch_runner_with_options() {
        let runner = BatchRunner::new(processor()).with_jobs(0);
        assert_eq!(runner.jobs(), 1);
        assert_eq!(runner.state(), BatchState::Idle);
    }

    #[test]
    fn test_all_items_processed_in_order() {
        let inputs = inputs(12);
        let runner = BatchRunner::new(processor()).with_jobs(4);
        let result = runner.run(&inputs).unwrap();

        assert_eq!(result.state, BatchState::Completed);
        assert_eq!(runner.state(), BatchState::Completed);
        assert_eq!(result.items.len(), 12);
        for (i, item) in result.items.iter().enumerate() {
            assert_eq!(item.name, format!("item/{}.png", i));
            assert_eq!(item.outcome, ItemOutcome::Processed);
            let decoded = decode_png(item.data.as_ref().unwrap()).unwrap();
            assert_eq!(decoded.dimensions(), (8, 8));
            assert_eq!(decoded.get(7, 7), [i as u8, 0, 0, 255]);
        }
    }

    #[test]
    fn test_empty_batch() {
        let result = BatchRunner::new(processor()).run(&[]).unwrap();
        assert_eq!(result.state, BatchState::Completed);
        assert!(result.items.is_empty());
    }

    #[test]
    fn test_second_run_rejected() {
        let runner = BatchRunner::new(processor());
        runner.run(&inputs(1)).unwrap();
        assert_eq!(runner.run(&inputs(1)).unwrap_err(), BatchError::NotIdle(BatchState::Completed));
    }

    #[test]
    fn test_kernel_init_failure_aborts() {
        let processor = Processor::new(
            Arc::new(KernelAdapter::new(Arc::new(BrokenInitKernel))),
            ScaleFactor::new(2).unwrap(),
        );
        let runner = BatchRunner::new(processor);
        let err = runner.run(&inputs(3)).unwrap_err();
        assert!(matches!(err, BatchError::KernelInit(KernelError::Init(_))));
        assert_eq!(runner.state(), BatchState::Idle);
    }

    #[test]
    fn test_skip_passes_original_through() {
        let inputs = vec![SourceImage::new("textures/font/ascii.png", b"not even a png".to_vec())];
        let result = BatchRunner::new(processor()).run(&inputs).unwrap();
        assert_eq!(result.items[0].outcome, ItemOutcome::Unchanged);
        assert_eq!(result.items[0].data.as_deref(), Some(&b"not even a png"[..]));
        assert_eq!(result.state, BatchState::Completed);
    }

    #[test]
    fn test_undecodable_input_fails_without_data() {
        let mut inputs = inputs(2);
        inputs[1].bytes = b"garbage".to_vec();
        let result = BatchRunner::new(processor()).with_jobs(2).run(&inputs).unwrap();
        assert_eq!(result.state, BatchState::PartiallyFailed);
        assert!(matches!(result.items[1].outcome, ItemOutcome::Failed(_)));
        assert!(result.items[1].data.is_none());
        assert_eq!(result.items[0].outcome, ItemOutcome::Processed);
    }

    #[test]
    fn test_oversized_input_falls_back() {
        let inputs = vec![SourceImage::new("big.png", png(20, 4, [1, 1, 1, 255]))];
        let runner = BatchRunner::new(processor().with_max_dimension(16));
        let result = runner.run(&inputs).unwrap();
        assert!(matches!(result.items[0].outcome, ItemOutcome::Fallback(_)));
        assert_eq!(result.items[0].data.as_ref(), Some(&inputs[0].bytes));
    }

    #[test]
    fn test_panicking_kernel_is_isolated() {
        let processor = Processor::new(
            Arc::new(KernelAdapter::new(Arc::new(PanickingKernel))),
            ScaleFactor::new(2).unwrap(),
        );
        let mut inputs = inputs(6);
        inputs[3].bytes = png(4, 4, [255, 0, 0, 255]);

        let result = BatchRunner::new(processor).with_jobs(3).run(&inputs).unwrap();
        assert_eq!(result.state, BatchState::PartiallyFailed);
        assert_eq!(result.fallback_count(), 1);
        match &result.items[3].outcome {
            ItemOutcome::Fallback(msg) => assert!(msg.contains("red pixel")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(result.items[3].data.as_ref(), Some(&inputs[3].bytes));
        assert_eq!(result.processed_count(), 5);
    }

    #[test]
    fn test_settings_override_skips_classification() {
        let inputs = vec![SourceImage::new("textures/font/ascii.png", png(2, 2, [5, 5, 5, 255]))];
        let runner = BatchRunner::new(processor())
            .with_settings_override(Some(ProcessSettings::default()));
        let result = runner.run(&inputs).unwrap();
        assert_eq!(result.items[0].outcome, ItemOutcome::Processed);
    }

    #[test]
    fn test_progress_counts_are_monotonic() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = CallbackProgress::new(move |done, total| {
            sink.lock().unwrap().push((done, total));
        });

        BatchRunner::new(processor())
            .with_jobs(4)
            .with_progress(Arc::new(progress))
            .run(&inputs(20))
            .unwrap();

        let seen = seen.lock().unwrap();
        let expected: Vec<_> = (1..=20).map(|n| (n, 20)).collect();
        assert_eq!(*seen, expected);
    }

    #[test]
    fn test_panicking_reporter_does_not_abort_batch() {
        let progress = CallbackProgress::new(|done, _| {
            if done == 3 {
                panic!("reporter failed");
            }
        });

        let runner = BatchRunner::new(processor()).with_jobs(2).with_progress(Arc::new(progress));
        let result = runner.run(&inputs(6)).unwrap();

        assert_eq!(result.state, BatchState::Completed);
        assert_eq!(runner.state(), BatchState::Completed);
        assert_eq!(result.processed_count(), 6);
        for (i, item) in result.items.iter().enumerate() {
            assert_eq!(item.name, format!("item/{}.png", i));
        }
    }

    #[test]
    fn test_non_reentrant_kernel_calls_never_overlap() {
        let kernel = Arc::new(OverlapCounter::default());
        let processor = Processor::new(
            Arc::new(KernelAdapter::new(kernel.clone())),
            ScaleFactor::new(2).unwrap(),
        );

        let result = BatchRunner::new(processor).with_jobs(8).run(&inputs(16)).unwrap();

        assert_eq!(result.processed_count(), 16);
        assert_eq!(kernel.calls.load(Ordering::SeqCst), 16);
        assert_eq!(kernel.peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_before_run() {
        let runner = BatchRunner::new(processor());
        runner.cancel_token().cancel();
        let result = runner.run(&inputs(5)).unwrap();
        assert_eq!(result.state, BatchState::Cancelled);
        assert_eq!(result.cancelled_count(), 5);
        assert!(result.items.iter().all(|r| r.data.is_none()));
    }

    #[test]
    fn test_cancel_mid_batch() {
        let token = CancelToken::new();
        let trigger = token.clone();
        let progress = CallbackProgress::new(move |done, _| {
            if done == 2 {
                trigger.cancel();
            }
        });

        let result = BatchRunner::new(processor())
            .with_jobs(1)
            .with_cancel_token(token)
            .with_progress(Arc::new(progress))
            .run(&inputs(6))
            .unwrap();

        assert_eq!(result.state, BatchState::Cancelled);
        assert_eq!(result.processed_count(), 2);
        assert_eq!(result.cancelled_count(), 4);
        assert_eq!(result.items.len(), 6);
    }

    #[test]
    fn test_item_error_keeps_original() {
        let decode = ItemError::Codec(crate::codec::decode_png(b"x").unwrap_err());
        assert!(!decode.keeps_original());
        let too_big =
            ItemError::Process(ProcessError::DimensionTooLarge { width: 1, height: 1, limit: 0 });
        assert!(too_big.keeps_original());
    }
}
