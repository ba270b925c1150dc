//! PDF inspection and rasterisation via pdfium.
//!
//! pdfium is not async-safe, so every entry point here moves its work onto
//! the blocking pool with `tokio::task::spawn_blocking`. A panic inside
//! pdfium (e.g. the shared library could not be bound) surfaces as an
//! ordinary error rather than taking the caller down.

use super::{PdfInspection, PdfInspector};
use crate::error::CollaboratorError;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default [`PdfInspector`] backed by pdfium.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumInspector;

#[async_trait]
impl PdfInspector for PdfiumInspector {
    async fn inspect(&self, pdf: &Path, page_limit: usize) -> Result<PdfInspection, CollaboratorError> {
        let path = pdf.to_path_buf();
        tokio::task::spawn_blocking(move || inspect_blocking(&path, page_limit))
            .await
            .map_err(|e| CollaboratorError::Inspect(format!("Inspection task panicked: {e}")))?
    }
}

/// Blocking implementation of PDF inspection.
fn inspect_blocking(pdf_path: &Path, page_limit: usize) -> Result<PdfInspection, CollaboratorError> {
    let pdfium = Pdfium::default();

    let document = match pdfium.load_pdf_from_file(pdf_path, None) {
        Ok(doc) => doc,
        Err(e) => {
            let err_str = format!("{:?}", e);
            if is_password_error(&err_str) {
                debug!("PDF requires a password: {}", pdf_path.display());
                return Ok(PdfInspection {
                    is_encrypted: true,
                    page_texts: Vec::new(),
                });
            }
            return Err(CollaboratorError::Inspect(format!(
                "Could not open PDF '{}': {}",
                pdf_path.display(),
                err_str
            )));
        }
    };

    // Owner-password PDFs open without a password but still carry a
    // security handler.
    if has_security_handler(document.permissions().security_handler_revision()) {
        debug!("PDF is encrypted with an owner password: {}", pdf_path.display());
        return Ok(PdfInspection {
            is_encrypted: true,
            page_texts: Vec::new(),
        });
    }

    let page_texts = document
        .pages()
        .iter()
        .take(page_limit)
        .enumerate()
        .map(|(idx, page)| {
            page.text().map(|t| t.all()).map_err(|e| {
                CollaboratorError::Inspect(format!("Text extraction failed for page {}: {:?}", idx + 1, e))
            })
        })
        .collect();

    Ok(PdfInspection {
        is_encrypted: false,
        page_texts,
    })
}

fn is_password_error(detail: &str) -> bool {
    detail.contains("Password") || detail.contains("password")
}

/// pdfium reports revisions 5 and 6 (AES-256) as unknown, which still
/// means a security handler is present.
fn has_security_handler(revision: Result<PdfSecurityHandlerRevision, PdfiumError>) -> bool {
    !matches!(revision, Ok(PdfSecurityHandlerRevision::Unprotected))
}

/// Rasterise every page of a PDF, longest edge capped at `max_pixels`.
///
/// # Returns
/// A vector of `(page_index_0based, DynamicImage)` tuples.
pub async fn render_pages(
    pdf_path: &Path,
    max_pixels: u32,
) -> Result<Vec<(usize, DynamicImage)>, CollaboratorError> {
    let path: PathBuf = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || render_pages_blocking(&path, max_pixels))
        .await
        .map_err(|e| CollaboratorError::Synthesis(format!("Render task panicked: {e}")))?
}

/// Blocking implementation of page rendering.
fn render_pages_blocking(
    pdf_path: &Path,
    max_pixels: u32,
) -> Result<Vec<(usize, DynamicImage)>, CollaboratorError> {
    let pdfium = Pdfium::default();

    let document = pdfium.load_pdf_from_file(pdf_path, None).map_err(|e| {
        CollaboratorError::Synthesis(format!("Could not open PDF '{}': {:?}", pdf_path.display(), e))
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            CollaboratorError::Synthesis(format!("Rasterisation failed for page {}: {:?}", idx + 1, e))
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        results.push((idx, image));
    }

    Ok(results)
}
