//! External capabilities the pipeline depends on.
//!
//! The pipeline never renders or synthesises anything itself. It drives three
//! collaborators through the traits below and treats each call as atomic:
//! one call, one outcome, no partial success.
//!
//! ```text
//! Office file ──▶ PdfRenderer ──▶ PDF(s) ──▶ PdfInspector ──▶ MarkdownRenderer ──▶ .md
//!                 (office)                   (pdfium)          (vision)
//! ```
//!
//! The default implementations live in the submodules:
//!
//! 1. [`office`]:  LibreOffice headless export, trying each configured
//!    program in turn
//! 2. [`pdfium`]:  encryption check and per-page text via pdfium, plus page
//!    rasterisation for the vision renderer
//! 3. [`vision`]:  page images sent to a VLM, one call per page
//! 4. [`postprocess`]: deterministic cleanup of VLM output

pub mod office;
pub mod pdfium;
pub mod postprocess;
pub mod vision;

use crate::config::MarkdownOptions;
use crate::error::CollaboratorError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// `RenderToPDF(inputPath) -> list<PDFPath>`.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    /// Render `input` into one or more PDFs placed in `out_dir`.
    ///
    /// Multi-unit documents may produce several artifacts (one per sheet).
    /// Any internal fallback happens inside this call.
    async fn render(&self, input: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, CollaboratorError>;
}

/// Result of [`PdfInspector::inspect`].
#[derive(Debug, Clone, Default)]
pub struct PdfInspection {
    /// The container reports itself encrypted.
    pub is_encrypted: bool,
    /// Extracted text of the leading pages, in page order. A page whose text
    /// could not be extracted carries its own error.
    pub page_texts: Vec<Result<String, CollaboratorError>>,
}

/// `InspectPDF(pdfPath) -> {isEncrypted, pageTexts}`.
#[async_trait]
pub trait PdfInspector: Send + Sync {
    /// Inspect `pdf`, extracting text for at most `page_limit` pages.
    async fn inspect(&self, pdf: &Path, page_limit: usize) -> Result<PdfInspection, CollaboratorError>;
}

/// `RenderMarkdown(pdfPath, outputPath, options) -> MarkdownPath`.
#[async_trait]
pub trait MarkdownRenderer: Send + Sync {
    /// Synthesise Markdown for `pdf` and write it to `output`.
    ///
    /// Returns the path actually written, which callers record verbatim.
    async fn render(
        &self,
        pdf: &Path,
        output: &Path,
        options: MarkdownOptions,
    ) -> Result<PathBuf, CollaboratorError>;
}
