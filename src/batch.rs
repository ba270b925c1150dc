//! Batch conversion over a list of files.
//!
//! [`BatchOrchestrator::run_batch`] converts every file once and aggregates
//! the outcomes into a [`BatchSummary`]. Up to
//! [`ConverterConfig::batch_concurrency`](crate::ConverterConfig) files run at
//! once; results are always reported in input order.
//!
//! A panic inside one file's conversion is caught here and recorded as a
//! `Failed` task, so the remaining files still run.

use crate::config::{is_lock_file, is_office_file};
use crate::error::{Office2MdError, TaskErrorKind};
use crate::pipeline::ConversionPipeline;
use crate::report::ReporterHandle;
use crate::task::{BatchSummary, ConversionTask};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// Runs a [`ConversionPipeline`] over many files.
pub struct BatchOrchestrator {
    pipeline: Arc<ConversionPipeline>,
    concurrency: usize,
    reporter: ReporterHandle,
}

impl BatchOrchestrator {
    /// Uses the pipeline's configured concurrency and reporter.
    pub fn new(pipeline: Arc<ConversionPipeline>) -> Self {
        let concurrency = pipeline.config().batch_concurrency.max(1);
        let reporter = Arc::clone(pipeline.reporter());
        Self {
            pipeline,
            concurrency,
            reporter,
        }
    }

    /// Convert every file in `files` into `output_dir`.
    ///
    /// Never fails: each file ends up as exactly one entry of the summary.
    pub async fn run_batch(&self, files: &[PathBuf], output_dir: &Path) -> BatchSummary {
        let start = Instant::now();
        info!(files = files.len(), concurrency = self.concurrency, "Batch started");
        self.reporter.on_batch_start(files.len());

        let tasks: Vec<ConversionTask> = stream::iter(files.iter().map(|f| self.convert_guarded(f, output_dir)))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut summary = BatchSummary::default();
        for task in tasks {
            summary.record(task);
        }

        log_summary(&summary, start.elapsed().as_millis() as u64);
        self.reporter.on_batch_complete(&summary);
        summary
    }

    async fn convert_guarded(&self, input: &Path, output_dir: &Path) -> ConversionTask {
        match AssertUnwindSafe(self.pipeline.convert(input, output_dir))
            .catch_unwind()
            .await
        {
            Ok(task) => task,
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                error!(input_file = %input.display(), %detail, "Conversion panicked");
                let mut task = ConversionTask::new(input);
                task.fail(TaskErrorKind::Unexpected, format!("Unexpected error: {detail}"));
                self.reporter.on_task_complete(&task);
                task
            }
        }
    }

    /// Office files directly in `dir` (or below it when `recursive`), sorted.
    ///
    /// Lock files (`~$name.docx`) are left out.
    pub fn discover_inputs(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>, Office2MdError> {
        if !dir.is_dir() {
            return Err(Office2MdError::ScanFailed {
                path: dir.to_path_buf(),
                detail: "not a directory".into(),
            });
        }

        let mut walker = WalkDir::new(dir).min_depth(1);
        if !recursive {
            walker = walker.max_depth(1);
        }

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();
            if entry.file_type().is_file() && is_office_file(path) && !is_lock_file(path) {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn log_summary(summary: &BatchSummary, duration_ms: u64) {
    info!("{}", "=".repeat(50));
    info!("Batch conversion finished");
    info!("Total:     {}", summary.total);
    info!("Completed: {}", summary.completed);
    info!("Failed:    {}", summary.failed);
    info!("Warning:   {}", summary.warning);
    info!("Skipped:   {}", summary.skipped);
    info!("Duration:  {}ms", duration_ms);
    info!("{}", "=".repeat(50));

    for task in summary.problem_files() {
        warn!(
            input_file = %task.file_name(),
            status = %task.status,
            reason = task.error_message.as_deref().unwrap_or(""),
            "Problem file"
        );
    }
}
