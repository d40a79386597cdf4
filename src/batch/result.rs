//! Batch result types.

use std::time::Duration;

/// What happened to one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Upscaled and re-encoded
    Processed,
    /// Classified as skip; original bytes passed through
    Unchanged,
    /// Processing failed; original bytes passed through
    Fallback(String),
    /// Input could not be read; no output
    Failed(String),
    /// Never started because the batch was cancelled
    Cancelled,
}

impl ItemOutcome {
    /// Whether this outcome makes the batch partially failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, ItemOutcome::Fallback(_) | ItemOutcome::Failed(_))
    }

    /// Short status label.
    pub fn label(&self) -> &'static str {
        match self {
            ItemOutcome::Processed => "processed",
            ItemOutcome::Unchanged => "unchanged",
            ItemOutcome::Fallback(_) => "fallback",
            ItemOutcome::Failed(_) => "failed",
            ItemOutcome::Cancelled => "cancelled",
        }
    }

    /// Diagnostic attached to a fallback or failure.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ItemOutcome::Fallback(msg) | ItemOutcome::Failed(msg) => Some(msg),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.diagnostic() {
            Some(msg) => write!(f, "{}: {}", self.label(), msg),
            None => write!(f, "{}", self.label()),
        }
    }
}

/// Result for a single input, keyed by the input's name.
#[derive(Debug, Clone)]
pub struct ItemResult {
    /// Name of the input this result belongs to
    pub name: String,
    pub outcome: ItemOutcome,
    /// Encoded output (original bytes for `Unchanged`/`Fallback`)
    pub data: Option<Vec<u8>>,
    pub duration: Duration,
}

impl ItemResult {
    pub fn processed(name: String, data: Vec<u8>, duration: Duration) -> Self {
        Self { name, outcome: ItemOutcome::Processed, data: Some(data), duration }
    }

    pub fn unchanged(name: String, original: Vec<u8>, duration: Duration) -> Self {
        Self { name, outcome: ItemOutcome::Unchanged, data: Some(original), duration }
    }

    pub fn fallback(name: String, error: String, original: Vec<u8>, duration: Duration) -> Self {
        Self { name, outcome: ItemOutcome::Fallback(error), data: Some(original), duration }
    }

    pub fn failed(name: String, error: String, duration: Duration) -> Self {
        Self { name, outcome: ItemOutcome::Failed(error), data: None, duration }
    }

    pub fn cancelled(name: String) -> Self {
        Self { name, outcome: ItemOutcome::Cancelled, data: None, duration: Duration::ZERO }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome.is_failure()
    }
}

/// Lifecycle of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running,
    /// Every item processed or passed through unchanged
    Completed,
    /// At least one item fell back or failed
    PartiallyFailed,
    /// Stopped early by a cancel token
    Cancelled,
}

impl BatchState {
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchState::Completed | BatchState::PartiallyFailed | BatchState::Cancelled)
    }
}

impl std::fmt::Display for BatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BatchState::Idle => "idle",
            BatchState::Running => "running",
            BatchState::Completed => "completed",
            BatchState::PartiallyFailed => "partially failed",
            BatchState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Result of a complete batch run, items in input order.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub items: Vec<ItemResult>,
    pub state: BatchState,
    pub total_duration: Duration,
}

impl BatchResult {
    /// Build a result and derive its terminal state.
    pub fn new(items: Vec<ItemResult>, cancelled: bool, total_duration: Duration) -> Self {
        let state = if cancelled && items.iter().any(|r| r.outcome == ItemOutcome::Cancelled) {
            BatchState::Cancelled
        } else if items.iter().any(ItemResult::is_failure) {
            BatchState::PartiallyFailed
        } else {
            BatchState::Completed
        };
        Self { items, state, total_duration }
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn processed_count(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Processed))
    }

    pub fn unchanged_count(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Unchanged))
    }

    pub fn fallback_count(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Fallback(_)))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Failed(_)))
    }

    pub fn cancelled_count(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Cancelled))
    }

    /// True when the batch completed with no fallbacks or failures.
    pub fn is_success(&self) -> bool {
        self.state == BatchState::Completed
    }

    /// Results that fell back or failed.
    pub fn failures(&self) -> Vec<&ItemResult> {
        self.items.iter().filter(|r| r.is_failure()).collect()
    }

    /// Look up a result by input name.
    pub fn get(&self, name: &str) -> Option<&ItemResult> {
        self.items.iter().find(|r| r.name == name)
    }

    /// Format a human-readable summary.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "Batch {}: {} processed, {} unchanged, {} fallback, {} failed ({} total) in {:?}",
            self.state,
            self.processed_count(),
            self.unchanged_count(),
            self.fallback_count(),
            self.failed_count(),
            self.items.len(),
            self.total_duration
        )];

        let cancelled = self.cancelled_count();
        if cancelled > 0 {
            lines.push(format!("  {} not started (cancelled)", cancelled));
        }

        let failures = self.failures();
        for item in failures.iter().take(10) {
            lines.push(format!("  - {}: {}", item.name, item.outcome));
        }
        if failures.len() > 10 {
            lines.push(format!("  ... and {} more", failures.len() - 10));
        }

        lines.join("\n")
    }
}
