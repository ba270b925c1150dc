//! # office2md
//!
//! Convert Word, Excel and PowerPoint files to Markdown through an
//! intermediate PDF, either as a one-shot batch or by watching a folder.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .docx / .xlsx / .pptx
//!  │
//!  ├─ 1. Validate  recognised extension, file exists
//!  ├─ 2. Render    Office → PDF (LibreOffice headless, program fallback)
//!  ├─ 3. Protect   encrypted or rights-managed PDF → placeholder + WARNING
//!  ├─ 4. Markdown  PDF pages → VLM → cleaned Markdown
//!  └─ 5. Report    ConversionTask / BatchSummary, tracing logs, reporter
//! ```
//!
//! Each stage's external capability sits behind a trait in [`backend`], so
//! the pipeline can be driven by other renderers (or by fakes in tests).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use office2md::{Backends, BatchOrchestrator, ConversionPipeline, ConverterConfig};
//! use office2md::config::{OfficeRendererConfig, VisionConfig};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let backends = Backends::with_defaults(OfficeRendererConfig::default(), VisionConfig::default())?;
//!     let pipeline = Arc::new(ConversionPipeline::new(ConverterConfig::default(), backends)?);
//!
//!     let files = BatchOrchestrator::discover_inputs(Path::new("./inbox"), false)?;
//!     let summary = BatchOrchestrator::new(pipeline).run_batch(&files, Path::new("./markdown")).await;
//!     eprintln!("{} converted, {} failed", summary.completed, summary.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `office2md` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ## Runtime Requirements
//!
//! The default collaborators need `soffice` (or `libreoffice`) on `PATH` and
//! a pdfium shared library the `pdfium-render` crate can bind to.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod batch;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod task;
pub mod watch;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{MarkdownRenderer, PdfInspection, PdfInspector, PdfRenderer};
pub use batch::BatchOrchestrator;
pub use config::{ConverterConfig, ConverterConfigBuilder, MarkdownOptions, WatchConfig, WatchConfigBuilder};
pub use error::{CollaboratorError, Office2MdError, TaskErrorKind};
pub use pipeline::protection::ProtectionDetector;
pub use pipeline::{Backends, ConversionPipeline};
pub use report::{ConversionReporter, NoopReporter, ReporterHandle};
pub use task::{BatchSummary, ConversionTask, TaskStatus};
pub use watch::{ChangeDebouncer, ChangeKind, WatchLoop, WatchStatistics, WatchedChange};
