//! Batch progress reporting.
//!
//! Workers report through a shared [`ProgressReporter`]. Console and JSON
//! reporters are provided for the CLI; [`CallbackProgress`] adapts a plain
//! closure for embedding callers that only need a "one more done" signal.
//!
//! ```ignore
//! use texscale::batch::{ConsoleProgress, ProgressEvent, ProgressReporter};
//!
//! let reporter = ConsoleProgress::new();
//! reporter.report(ProgressEvent::BatchStarted { total: 10, workers: 4 });
//! ```

use std::io::Write;
use std::sync::Mutex;

use serde_json::json;

use super::result::{BatchState, ItemOutcome};

/// Events emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Batch accepted its inputs and is about to start workers
    BatchStarted {
        /// Number of inputs
        total: usize,
        /// Number of worker threads
        workers: usize,
    },
    /// One item finished (in any outcome)
    ItemCompleted {
        name: String,
        outcome: ItemOutcome,
        /// Items finished so far, including this one; strictly increasing
        completed: usize,
        total: usize,
        duration_ms: u64,
    },
    /// Batch reached a terminal state
    BatchCompleted {
        state: BatchState,
        duration_ms: u64,
        processed: usize,
        unchanged: usize,
        fallback: usize,
        failed: usize,
    },
}

/// Receives progress events. Called from worker threads.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Discards all events.
#[derive(Debug, Default)]
pub struct NullProgress;

impl NullProgress {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for NullProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Calls a closure with `(completed, total)` for every finished item.
pub struct CallbackProgress<F> {
    callback: F,
}

impl<F> CallbackProgress<F>
where
    F: Fn(usize, usize) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for CallbackProgress<F>
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        if let ProgressEvent::ItemCompleted { completed, total, .. } = event {
            (self.callback)(completed, total);
        }
    }
}

/// Console progress reporter with optional colors.
pub struct ConsoleProgress {
    use_colors: bool,
    /// Print a line for every item, not only fallbacks and failures
    verbose: bool,
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleProgress")
            .field("use_colors", &self.use_colors)
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl ConsoleProgress {
    /// Create a reporter writing to stderr.
    pub fn new() -> Self {
        Self {
            use_colors: true,
            verbose: false,
            output: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Create a reporter writing to `output`, without colors.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self {
            use_colors: false,
            verbose: false,
            output: Mutex::new(Box::new(output)),
        }
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn color(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            format!("{}{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.color(text, "\x1b[32m")
    }

    fn yellow(&self, text: &str) -> String {
        self.color(text, "\x1b[33m")
    }

    fn red(&self, text: &str) -> String {
        self.color(text, "\x1b[31m")
    }

    fn cyan(&self, text: &str) -> String {
        self.color(text, "\x1b[36m")
    }

    fn writeln(&self, line: &str) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", line);
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::BatchStarted { total, workers } => {
                self.writeln(&format!(
                    "{} Upscaling {} image{} on {} worker{}...",
                    self.cyan("[upscale]"),
                    total,
                    if total == 1 { "" } else { "s" },
                    workers,
                    if workers == 1 { "" } else { "s" }
                ));
            }
            ProgressEvent::ItemCompleted { name, outcome, completed, total, duration_ms } => {
                let status = match &outcome {
                    ItemOutcome::Processed => self.green("ok"),
                    ItemOutcome::Unchanged => self.yellow("unchanged"),
                    ItemOutcome::Fallback(_) => self.yellow("FALLBACK"),
                    ItemOutcome::Failed(_) => self.red("FAILED"),
                    ItemOutcome::Cancelled => self.yellow("cancelled"),
                };
                if !self.verbose && !outcome.is_failure() {
                    return;
                }
                self.writeln(&format!(
                    "{} [{}/{}] {} {} ({})",
                    self.cyan("[upscale]"),
                    completed,
                    total,
                    status,
                    name,
                    format_duration(duration_ms)
                ));
                if let Some(msg) = outcome.diagnostic() {
                    self.writeln(&format!("        {}", self.red(msg)));
                }
            }
            ProgressEvent::BatchCompleted {
                state,
                duration_ms,
                processed,
                unchanged,
                fallback,
                failed,
            } => {
                let tag = match state {
                    BatchState::Completed => self.green("[done]"),
                    BatchState::Cancelled => self.yellow("[cancelled]"),
                    _ => self.red("[error]"),
                };
                self.writeln(&format!(
                    "\n{} {} processed, {} unchanged, {} fallback, {} failed in {}",
                    tag,
                    processed,
                    unchanged,
                    fallback,
                    failed,
                    format_duration(duration_ms)
                ));
            }
        }
    }
}

/// Newline-delimited JSON reporter for machine consumption.
pub struct JsonProgress {
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for JsonProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonProgress").finish()
    }
}

impl JsonProgress {
    /// Create a reporter writing to stderr.
    pub fn new() -> Self {
        Self { output: Mutex::new(Box::new(std::io::stderr())) }
    }

    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self { output: Mutex::new(Box::new(output)) }
    }

    fn write_json(&self, value: serde_json::Value) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", value);
        }
    }
}

impl Default for JsonProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let value = match event {
            ProgressEvent::BatchStarted { total, workers } => {
                json!({ "event": "batch_started", "total": total, "workers": workers })
            }
            ProgressEvent::ItemCompleted { name, outcome, completed, total, duration_ms } => {
                let mut value = json!({
                    "event": "item_completed",
                    "name": name,
                    "status": outcome.label(),
                    "completed": completed,
                    "total": total,
                    "duration_ms": duration_ms,
                });
                if let Some(msg) = outcome.diagnostic() {
                    value["error"] = json!(msg);
                }
                value
            }
            ProgressEvent::BatchCompleted {
                state,
                duration_ms,
                processed,
                unchanged,
                fallback,
                failed,
            } => json!({
                "event": "batch_completed",
                "state": state.to_string(),
                "duration_ms": duration_ms,
                "processed": processed,
                "unchanged": unchanged,
                "fallback": fallback,
                "failed": failed,
            }),
        };
        self.write_json(value);
    }
}

/// Format milliseconds as `850ms`, `2.5s`, or `3m 4s`.
fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1000)
    }
}
