//! Per-file conversion state machine.
//!
//! [`ConversionPipeline::convert`] drives one input file through the
//! collaborators in [`crate::backend`]:
//!
//! ```text
//! Pending ──▶ PdfConverting ──▶ protection check ──▶ MarkdownConverting ──▶ Completed
//!    │              │                  │                      │
//!    ▼              ▼                  ▼                      ▼
//! Skipped /      Failed             Warning                Failed
//! Failed         (render)           (placeholder)          (synthesis)
//! ```
//!
//! The pipeline never returns an error: every outcome, including collaborator
//! failures, is recorded on the returned [`ConversionTask`]. Only the
//! constructor can fail, when the working area cannot be created.
//!
//! 1. [`protection`]:  encryption and rights-management marker detection
//! 2. [`placeholder`]: Markdown written in place of protected content
//! 3. [`workspace`]:   per-input PDF directories under the intermediate root

pub mod placeholder;
pub mod protection;
pub mod workspace;

use crate::backend::office::OfficeRenderer;
use crate::backend::pdfium::PdfiumInspector;
use crate::backend::vision::VisionMarkdownRenderer;
use crate::backend::{MarkdownRenderer, PdfInspector, PdfRenderer};
use crate::config::{is_office_file, ConverterConfig, OfficeRendererConfig, VisionConfig, PROTECTION_LABEL};
use crate::error::{Office2MdError, TaskErrorKind};
use crate::report::{self, ReporterHandle};
use crate::task::{ConversionTask, TaskStatus};
use protection::ProtectionDetector;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use workspace::Workspace;

/// Message recorded on a task skipped for its extension.
pub const NOT_OFFICE_FILE: &str = "Not an Office file";
/// Message recorded when the input path does not exist.
pub const INPUT_MISSING: &str = "Input file does not exist";
/// Message recorded when the renderer reports success without artifacts.
pub const NO_PDF_OUTPUT: &str = "PDF conversion failed - no output files";

/// Message recorded on a task that ended in `Warning`.
pub fn protection_warning_message() -> String {
    format!("{PROTECTION_LABEL} detected - cannot process protected content")
}

/// The three collaborators the pipeline drives.
#[derive(Clone)]
pub struct Backends {
    pub renderer: Arc<dyn PdfRenderer>,
    pub inspector: Arc<dyn PdfInspector>,
    pub markdown: Arc<dyn MarkdownRenderer>,
}

impl Backends {
    /// LibreOffice rendering, pdfium inspection and VLM synthesis.
    ///
    /// Fails when no LLM provider can be resolved.
    pub fn with_defaults(office: OfficeRendererConfig, vision: VisionConfig) -> Result<Self, Office2MdError> {
        Ok(Self {
            renderer: Arc::new(OfficeRenderer::new(office)),
            inspector: Arc::new(PdfiumInspector),
            markdown: Arc::new(VisionMarkdownRenderer::new(vision)?),
        })
    }
}

/// Converts single Office files to Markdown.
///
/// Cheap to share: wrap it in an `Arc` and call [`convert`](Self::convert)
/// from as many tasks as needed. Tasks for different files do not interfere.
pub struct ConversionPipeline {
    config: ConverterConfig,
    workspace: Workspace,
    backends: Backends,
    detector: ProtectionDetector,
    reporter: ReporterHandle,
}

impl ConversionPipeline {
    /// Build a pipeline and prepare its working area.
    ///
    /// Leftover PDFs from a previous run are purged first. Creating the
    /// intermediate directory is the only fatal step.
    pub fn new(config: ConverterConfig, backends: Backends) -> Result<Self, Office2MdError> {
        let workspace = Workspace::new(&config.intermediate_dir);
        let detector = ProtectionDetector::new(Arc::clone(&backends.inspector), &config);
        let pipeline = Self {
            config,
            workspace,
            backends,
            detector,
            reporter: report::noop(),
        };

        pipeline.purge_intermediate();
        std::fs::create_dir_all(pipeline.workspace.root()).map_err(|e| Office2MdError::CreateDirFailed {
            path: pipeline.workspace.root().to_path_buf(),
            source: e,
        })?;
        info!(intermediate_dir = %pipeline.workspace.root().display(), "Conversion pipeline ready");
        Ok(pipeline)
    }

    /// Attach a reporter that receives task start/complete events.
    pub fn with_reporter(mut self, reporter: ReporterHandle) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn reporter(&self) -> &ReporterHandle {
        &self.reporter
    }

    /// Remove every intermediate PDF. Failures are logged and ignored.
    pub fn purge_intermediate(&self) {
        match self.workspace.purge() {
            Ok(()) => debug!(pdf_root = %self.workspace.pdf_root().display(), "Intermediate PDFs purged"),
            Err(e) => warn!(
                pdf_root = %self.workspace.pdf_root().display(),
                error = %e,
                "Could not purge intermediate PDFs"
            ),
        }
    }

    /// Convert `input` into `<output_dir>/<stem>.md`.
    ///
    /// Always returns a task in a terminal state.
    pub async fn convert(&self, input: &Path, output_dir: &Path) -> ConversionTask {
        self.reporter.on_task_start(input);
        let mut task = ConversionTask::new(input);

        self.run(&mut task, output_dir).await;

        log_outcome(&task);
        self.reporter.on_task_complete(&task);
        task
    }

    async fn run(&self, task: &mut ConversionTask, output_dir: &Path) {
        let input = task.input_file().to_path_buf();

        // ── Validation ───────────────────────────────────────────────────
        if !is_office_file(&input) {
            task.finish(
                TaskStatus::Skipped,
                Some(TaskErrorKind::Validation),
                Some(NOT_OFFICE_FILE.to_string()),
            );
            return;
        }
        let exists = tokio::fs::metadata(&input)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !exists {
            task.fail(TaskErrorKind::Validation, INPUT_MISSING);
            return;
        }

        // ── Render ───────────────────────────────────────────────────────
        task.advance(TaskStatus::PdfConverting);
        let pdf_dir = self.workspace.pdf_dir_for(&input);
        if let Some(previous) = self.workspace.claim(&input) {
            warn!(
                input_file = %input.display(),
                previous = %previous.display(),
                pdf_dir = %pdf_dir.display(),
                "Input shares its stem with an earlier input; PDFs and Markdown output will be overwritten"
            );
        }
        for dir in [pdf_dir.as_path(), output_dir] {
            if let Err(e) = tokio::fs::create_dir_all(dir).await {
                let err = Office2MdError::CreateDirFailed {
                    path: dir.to_path_buf(),
                    source: e,
                };
                task.fail(TaskErrorKind::Unexpected, err.to_string());
                return;
            }
        }

        let artifacts = match self.backends.renderer.render(&input, &pdf_dir).await {
            Ok(a) => a,
            Err(e) => {
                task.fail(TaskErrorKind::RenderFailure, e.to_string());
                return;
            }
        };
        let Some(primary) = artifacts.first().cloned() else {
            task.fail(TaskErrorKind::RenderFailure, NO_PDF_OUTPUT);
            return;
        };
        if artifacts.len() > 1 {
            debug!(
                input_file = %input.display(),
                artifacts = artifacts.len(),
                "Only the first PDF artifact is converted"
            );
        }
        task.pdf_artifacts = artifacts;

        let output = output_path(&input, output_dir);

        // ── Protection check ─────────────────────────────────────────────
        if self.detector.is_protected(&primary).await {
            match placeholder::write(&output, &task.file_name(), PROTECTION_LABEL).await {
                Ok(()) => task.output_file = Some(output),
                Err(e) => error!(
                    output = %output.display(),
                    error = %e,
                    "Failed to write protection placeholder"
                ),
            }
            task.finish(
                TaskStatus::Warning,
                Some(TaskErrorKind::ProtectionWarning),
                Some(protection_warning_message()),
            );
            return;
        }

        // ── Markdown ─────────────────────────────────────────────────────
        task.advance(TaskStatus::MarkdownConverting);
        match self
            .backends
            .markdown
            .render(&primary, &output, self.config.markdown)
            .await
        {
            Ok(written) => task.complete(written),
            Err(e) => task.fail(TaskErrorKind::SynthesisFailure, e.to_string()),
        }
    }
}

/// `<output_dir>/<stem of input>.md`
pub fn output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let mut name = input
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "unnamed".into());
    name.push(".md");
    output_dir.join(name)
}

fn log_outcome(task: &ConversionTask) {
    let input_file = task.file_name();
    let duration_ms = task.duration_ms().unwrap_or_default();
    let reason = task.error_message.as_deref().unwrap_or("");
    match task.status {
        TaskStatus::Completed => info!(
            %input_file,
            output = %task.output_file.as_deref().map(|p| p.display().to_string()).unwrap_or_default(),
            duration_ms,
            "Conversion completed"
        ),
        TaskStatus::Skipped => info!(%input_file, %reason, "Conversion skipped"),
        TaskStatus::Warning => warn!(%input_file, %reason, duration_ms, "Conversion finished with warning"),
        TaskStatus::Failed => error!(%input_file, %reason, duration_ms, "Conversion failed"),
        status => error!(%input_file, %status, "Conversion ended in a non-terminal state"),
    }
}
