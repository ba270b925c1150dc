//! Reporting sink for conversion and watch events.
//!
//! Inject an [`Arc<dyn ConversionReporter>`] into the pipeline, the batch
//! orchestrator, or the watch loop to observe what they do. The library
//! logs through `tracing` regardless; the reporter is for callers that need
//! the events themselves (terminal progress bars, report files, tests).
//!
//! # Example
//!
//! ```rust
//! use office2md::{ConversionReporter, ConversionTask};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountingReporter {
//!     finished: AtomicUsize,
//! }
//!
//! impl ConversionReporter for CountingReporter {
//!     fn on_task_complete(&self, task: &ConversionTask) {
//!         self.finished.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{} → {}", task.file_name(), task.status);
//!     }
//! }
//! ```

use crate::task::{BatchSummary, ConversionTask};
use crate::watch::WatchedChange;
use std::path::Path;
use std::sync::Arc;

/// Receives events from the pipeline, batch and watch components.
///
/// Implementations must be `Send + Sync`: tasks for different files can run
/// concurrently, and watch events arrive from a background task. All methods
/// default to no-ops.
pub trait ConversionReporter: Send + Sync {
    /// A pipeline invocation started for `input`.
    fn on_task_start(&self, input: &Path) {
        let _ = input;
    }

    /// A task reached its terminal state.
    fn on_task_complete(&self, task: &ConversionTask) {
        let _ = task;
    }

    /// A batch of `total` files is about to run.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// A batch finished; `summary` is final.
    fn on_batch_complete(&self, summary: &BatchSummary) {
        let _ = summary;
    }

    /// The debouncer emitted a coalesced change.
    fn on_change_detected(&self, change: &WatchedChange) {
        let _ = change;
    }
}

/// A reporter that ignores every event. The default.
pub struct NoopReporter;

impl ConversionReporter for NoopReporter {}

/// Shared handle type stored by the components.
pub type ReporterHandle = Arc<dyn ConversionReporter>;

/// A fresh [`NoopReporter`] handle.
pub fn noop() -> ReporterHandle {
    Arc::new(NoopReporter)
}
