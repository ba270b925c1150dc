//! Per-file task records and batch summaries.
//!
//! A [`ConversionTask`] is created by the pipeline in `Pending` state, moved
//! forward as each stage starts, and finished exactly once in one of the four
//! terminal states. [`BatchSummary`] aggregates finished tasks.

use crate::error::TaskErrorKind;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Lifecycle state of a [`ConversionTask`].
///
/// ```text
/// Pending ─▶ PdfConverting ─▶ MarkdownConverting ─▶ Completed
///    │             │                   │
///    └──▶ Skipped  ├──▶ Warning        └──▶ Failed
///    └──▶ Failed   └──▶ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    PdfConverting,
    MarkdownConverting,
    Completed,
    Failed,
    Skipped,
    Warning,
}

impl TaskStatus {
    /// Whether no further transition can occur.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped | TaskStatus::Warning
        )
    }

    fn rank(&self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::PdfConverting => 1,
            TaskStatus::MarkdownConverting => 2,
            _ => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::PdfConverting => "pdf_converting",
            TaskStatus::MarkdownConverting => "markdown_converting",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Warning => "warning",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempt to convert one input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionTask {
    input_file: PathBuf,
    pub status: TaskStatus,
    pub start_time: DateTime<Local>,
    pub end_time: Option<DateTime<Local>>,
    /// PDFs produced by the render stage, in renderer order.
    pub pdf_artifacts: Vec<PathBuf>,
    /// Set on `Completed`, and on `Warning` when the placeholder was written.
    pub output_file: Option<PathBuf>,
    pub error_kind: Option<TaskErrorKind>,
    pub error_message: Option<String>,
}

impl ConversionTask {
    /// Create a task in `Pending` state with `start_time = now`.
    pub fn new(input_file: impl Into<PathBuf>) -> Self {
        Self {
            input_file: input_file.into(),
            status: TaskStatus::Pending,
            start_time: Local::now(),
            end_time: None,
            pdf_artifacts: Vec::new(),
            output_file: None,
            error_kind: None,
            error_message: None,
        }
    }

    pub fn input_file(&self) -> &Path {
        &self.input_file
    }

    /// File name of the input, for logs and reports.
    pub fn file_name(&self) -> String {
        self.input_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input_file.display().to_string())
    }

    /// Move to a non-terminal stage. Backward moves and moves out of a
    /// terminal state are ignored.
    pub(crate) fn advance(&mut self, next: TaskStatus) {
        debug_assert!(!next.is_terminal(), "use finish() for terminal states");
        if self.status.is_terminal() || next.rank() < self.status.rank() {
            return;
        }
        self.status = next;
    }

    /// Enter `Completed` with the produced Markdown path.
    pub(crate) fn complete(&mut self, output_file: PathBuf) {
        if self.status.is_terminal() {
            return;
        }
        self.output_file = Some(output_file);
        self.finish(TaskStatus::Completed, None, None);
    }

    /// Enter a terminal state. The first call wins; later calls are ignored
    /// so `end_time` is set exactly once.
    pub(crate) fn finish(
        &mut self,
        status: TaskStatus,
        kind: Option<TaskErrorKind>,
        message: Option<String>,
    ) {
        debug_assert!(status.is_terminal());
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.error_kind = kind;
        self.error_message = message;
        self.end_time = Some(Local::now());
    }

    /// Shorthand for `finish(Failed, Some(kind), Some(message))`.
    pub(crate) fn fail(&mut self, kind: TaskErrorKind, message: impl Into<String>) {
        self.finish(TaskStatus::Failed, Some(kind), Some(message.into()));
    }

    /// Wall-clock duration once the task has finished.
    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds())
    }
}

/// Aggregate over the tasks of one batch run.
///
/// `total == completed + failed + skipped + warning` always holds once the
/// batch has finished.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub warning: usize,
    /// Every task in input order.
    pub details: Vec<ConversionTask>,
}

impl BatchSummary {
    /// Record one finished task.
    pub fn record(&mut self, task: ConversionTask) {
        self.total += 1;
        match task.status {
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Skipped => self.skipped += 1,
            TaskStatus::Warning => self.warning += 1,
            // A non-terminal status here means the pipeline returned early
            // without finishing the task; count it as a failure.
            _ => self.failed += 1,
        }
        self.details.push(task);
    }

    /// Tasks that ended in `Warning` or `Failed`, in input order.
    pub fn problem_files(&self) -> impl Iterator<Item = &ConversionTask> {
        self.details
            .iter()
            .filter(|t| matches!(t.status, TaskStatus::Warning | TaskStatus::Failed))
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.completed + self.failed + self.skipped + self.warning
            && self.total == self.details.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_is_pending() {
        let t = ConversionTask::new("/in/report.docx");
        assert_eq!(t.status, TaskStatus::Pending);
        assert!(t.end_time.is_none());
        assert!(t.pdf_artifacts.is_empty());
        assert_eq!(t.file_name(), "report.docx");
    }

    #[test]
    fn advance_is_monotonic() {
        let mut t = ConversionTask::new("a.docx");
        t.advance(TaskStatus::MarkdownConverting);
        t.advance(TaskStatus::PdfConverting);
        assert_eq!(t.status, TaskStatus::MarkdownConverting);
    }

    #[test]
    fn finish_sets_end_time_once() {
        let mut t = ConversionTask::new("a.docx");
        t.fail(TaskErrorKind::RenderFailure, "boom");
        let first_end = t.end_time;
        assert!(first_end.is_some());

        t.finish(TaskStatus::Completed, None, None);
        assert_eq!(t.status, TaskStatus::Failed);
        assert_eq!(t.end_time, first_end);
        assert_eq!(t.error_message.as_deref(), Some("boom"));

        t.advance(TaskStatus::PdfConverting);
        assert_eq!(t.status, TaskStatus::Failed);
    }

    #[test]
    fn summary_counts_add_up() {
        let mut s = BatchSummary::default();
        let mut done = ConversionTask::new("a.docx");
        done.complete(PathBuf::from("a.md"));
        let mut skipped = ConversionTask::new("b.txt");
        skipped.finish(TaskStatus::Skipped, Some(TaskErrorKind::Validation), None);
        let mut warn = ConversionTask::new("c.pptx");
        warn.finish(
            TaskStatus::Warning,
            Some(TaskErrorKind::ProtectionWarning),
            Some("protected".into()),
        );
        let stuck = ConversionTask::new("d.xlsx");

        for t in [done, skipped, warn, stuck] {
            s.record(t);
        }

        assert_eq!(s.total, 4);
        assert_eq!((s.completed, s.skipped, s.warning, s.failed), (1, 1, 1, 1));
        assert!(s.is_consistent());
        let problems: Vec<String> = s.problem_files().map(|t| t.file_name()).collect();
        assert_eq!(problems, vec!["c.pptx", "d.xlsx"]);
    }

    #[test]
    fn empty_summary_is_consistent() {
        assert!(BatchSummary::default().is_consistent());
    }
}
